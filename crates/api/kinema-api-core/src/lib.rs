//! kinema-api-core: animatable values, value mixing and layout geometry shared
//! by the animation and projection crates.

pub mod coercion;
pub mod color;
pub mod geometry;
pub mod mix;
pub mod value;

pub use color::Rgba;
pub use geometry::{Axis, AxisDelta, Delta, LayoutBox, Point};
pub use mix::{can_mix, mix, mix_number, mixer, Mixer};
pub use value::{Complex, Token, Unit, Value, ValueError, ValueKind, ValueMap};
