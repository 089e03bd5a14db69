//! Fast marching: the front-propagation engine and the module that turns
//! seeds and a speed image into an initial level set.

pub mod marcher;
pub mod module;

pub use marcher::{ArrivalTimes, FastMarcher, Speed, MINIMUM_SPEED};
pub use module::{FastMarchingModule, FastMarchingParams};
