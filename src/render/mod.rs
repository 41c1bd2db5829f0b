pub mod canvas;
pub mod effects;
pub mod overlay;
pub mod registry;
pub mod stroke;
