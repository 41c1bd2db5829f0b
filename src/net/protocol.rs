//! Wire protocol: JSON envelopes `{ "type": ..., "data": ... }`

use serde::{Deserialize, Deserializer, Serialize};

use crate::util::vec2::Vec2;

/// Opaque entity identifier, unique within one snapshot
pub type EntityId = String;

/// Card identifier as assigned by the server catalog
pub type CardId = u64;

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Currently held movement keys
    Input(InputState),
    /// Card picked from an offer
    CardChoice { card_id: CardId },
}

/// Messages from server to client
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// Local identity for this connection
    Welcome(WelcomeData),
    /// Full population snapshot
    GameState(GameStateData),
    /// Cards the player may choose from
    CardOffer(CardOfferData),
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Welcome(_) => "welcome",
            ServerMessage::GameState(_) => "game_state",
            ServerMessage::CardOffer(_) => "card_offer",
        }
    }
}

/// Movement key state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputState {
    pub w: bool,
    pub a: bool,
    pub s: bool,
    pub d: bool,
}

impl InputState {
    pub fn any(&self) -> bool {
        self.w || self.a || self.s || self.d
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WelcomeData {
    pub player_id: EntityId,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GameStateData {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub players: Vec<PlayerSnapshot>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub pellets: Vec<PelletSnapshot>,
}

impl GameStateData {
    pub fn player(&self, id: &str) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|p| p.id == id)
    }
}

/// Authoritative player state
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlayerSnapshot {
    pub id: EntityId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub health: f64,
    #[serde(default)]
    pub max_health: f64,
    #[serde(default)]
    pub damage: f64,
    #[serde(default)]
    pub barrier: f64,
    #[serde(default)]
    pub max_barrier: f64,
    #[serde(default)]
    pub next_card_score: i64,
    #[serde(default)]
    pub cards_pending: bool,
    /// Acquired upgrade names, in acquisition order
    #[serde(default, deserialize_with = "null_as_empty")]
    pub applied_cards: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub auras: Vec<AuraSnapshot>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub active_effects: Vec<ActiveEffectSnapshot>,
}

impl PlayerSnapshot {
    #[inline]
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AuraSnapshot {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub radius: f64,
    #[serde(default)]
    pub strength: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActiveEffectSnapshot {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub remaining: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PelletSnapshot {
    pub id: EntityId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub size: f64,
}

impl PelletSnapshot {
    #[inline]
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CardOfferData {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub cards: Vec<CardDef>,
}

/// Card definition, shared by offers and the static catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDef {
    pub id: CardId,
    pub name: String,
    #[serde(default)]
    pub rarity: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub effects: Vec<CardEffect>,
    /// Set this card belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardEffect {
    pub stat: String,
    #[serde(default)]
    pub modifier: f64,
    /// Set only for `aura_add` effects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aura_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aura_radius: Option<f64>,
}

/// Go encodes nil slices as `null`; treat that the same as a missing field
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Encode a client message as a JSON text frame
pub fn encode(message: &ClientMessage) -> Result<String, EncodeError> {
    serde_json::to_string(message).map_err(EncodeError)
}

/// Decode a server text frame
pub fn decode(text: &str) -> Result<ServerMessage, DecodeError> {
    let Envelope { kind, data } = serde_json::from_str(text).map_err(DecodeError::Malformed)?;

    let result = match kind.as_str() {
        "welcome" => serde_json::from_value(data).map(ServerMessage::Welcome),
        "game_state" => serde_json::from_value(data).map(ServerMessage::GameState),
        "card_offer" => serde_json::from_value(data).map(ServerMessage::CardOffer),
        _ => return Err(DecodeError::UnknownType(kind.clone())),
    };

    result.map_err(|source| DecodeError::InvalidPayload { kind, source })
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(#[source] serde_json::Error);

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("Unknown message type '{0}'")]
    UnknownType(String),
    #[error("Invalid '{kind}' payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}
