pub mod buffer2;
pub mod file_format;
pub mod log_setup;

pub use buffer2::Buffer2;
pub use file_format::{
    deserialize, get_file_extension, FileExtensionError, FileFormat, FileFormatResult,
    SerdeFormatError, SerdeFormatResult,
};
pub use log_setup::{setup_logging, LogSetupError};
