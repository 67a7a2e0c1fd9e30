pub mod config;
pub mod error;
pub mod font;
pub mod io;
pub mod pixel;
pub mod primitives;
pub mod psd;
pub mod rle;
pub mod subsystem;
pub mod surface;
pub mod text;
pub mod types;

pub use config::GfxConfig;
pub use error::{ErrorKind, GfxError, PsdError, RleError};
pub use font::{BitmapFont, Font, FontStyle, RenderStyle, TextFont, TrueTypeFont};
pub use pixel::{BlendMode, PixelFormat};
pub use psd::{PsdCodec, PsdImage, PsdLayer, PsdOptions};
pub use subsystem::{Subsystem, SubsystemHandle, SubsystemKind};
pub use surface::Surface;
pub use types::*;
