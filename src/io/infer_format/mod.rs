mod dispatch;
mod inference;
mod registry;

pub use dispatch::{DatasetError, DatasetReader, DatasetReaderBuilder, LoadedDatasets};
pub use inference::{
    infer_format, infer_from_path, infer_from_stream, normalize_extension, path_extension,
    MsiFormat,
};
pub use registry::{Loader, LoaderRegistry};
