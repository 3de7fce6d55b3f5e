pub mod costmatrix;
pub mod costmatrixsystem;
pub mod overlay;
pub mod pathfinder;
pub mod travel;

pub use costmatrix::*;
pub use costmatrixsystem::*;
pub use overlay::*;
pub use pathfinder::*;
pub use travel::*;
