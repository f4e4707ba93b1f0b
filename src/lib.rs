pub mod augment;
pub mod dataloader;
pub mod iterators;
pub mod loaders;

pub use augment::{Augmentor, CombinedAugmentor};
pub use dataloader::config::ProviderConfig;
pub use dataloader::data_batch::DataBatch;
pub use dataloader::datasource::{
    Dataset, FilenamePair, ImageData, ImageTargetPair, PixelType, VOID_LABEL,
};
pub use dataloader::error::DataLoaderError;
pub use dataloader::provider::DataProvider;
pub use iterators::SampleIterator;
pub use loaders::{ImageLoader, PairLoader, TargetLoader};
