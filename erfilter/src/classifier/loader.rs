use std::path::Path;

use common::FileFormat;

use super::ClassifierModel;
use crate::error::ModelLoadError;

impl ClassifierModel {
    /// Parse and validate a model from YAML or JSON text.
    pub fn parse(text: &str, format: FileFormat) -> Result<Self, ModelLoadError> {
        let model: ClassifierModel = common::deserialize(text, format)?;
        model.validate()?;
        Ok(model)
    }
}

/// Load a model file; the format follows the extension (`.yaml`, `.yml`, `.json`).
pub fn load_classifier(path: impl AsRef<Path>) -> Result<ClassifierModel, ModelLoadError> {
    let path = path.as_ref();
    let format = FileFormat::from_path(path)?;
    let text = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let model = ClassifierModel::parse(&text, format)?;

    tracing::info!(
        path = %path.display(),
        features = ?model.features(),
        "Loaded classifier model"
    );

    Ok(model)
}
