pub mod image;
pub mod transform;
pub mod user;

pub use self::image::*;
pub use self::transform::*;
pub use self::user::*;
