pub mod chunk;
pub mod fort;
pub mod grid;
pub mod health;
pub mod performance;
pub mod preprocess;

pub use chunk::get_grid_chunk;
pub use fort::convert_fort;
pub use grid::get_grid;
pub use health::hello;
pub use performance::get_performance;
pub use preprocess::preprocess_grid;
