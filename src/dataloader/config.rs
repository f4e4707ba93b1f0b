use super::datasource::VOID_LABEL;
use super::error::DataLoaderError;

pub struct ProviderConfig {
    pub threads: usize,
    pub batch_size: usize,
    pub num_classes: usize,
}

impl ProviderConfig {
    pub fn build(self) -> Result<Self, DataLoaderError> {
        if self.batch_size == 0 {
            return Err(DataLoaderError::InvalidConfig("batch_size must be positive".into()));
        }
        check_num_classes(self.num_classes)?;
        if self.threads == 0 {
            return Err(DataLoaderError::InvalidConfig("threads must be positive".into()));
        }

        Ok(self)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            batch_size: 32,
            num_classes: 19,
        }
    }
}

// Class ids share the u8 label space with the void sentinel
fn check_num_classes(num_classes: usize) -> Result<(), DataLoaderError> {
    if num_classes == 0 || num_classes > VOID_LABEL as usize {
        return Err(DataLoaderError::InvalidConfig(format!(
            "num_classes must be in 1..={}, got {}",
            VOID_LABEL, num_classes
        )));
    }
    Ok(())
}
