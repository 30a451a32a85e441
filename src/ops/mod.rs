pub mod brush;
pub mod compositor;
pub mod edit_api;
