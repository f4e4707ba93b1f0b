use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use image::{GrayImage, Luma, Rgb, RgbImage};
use tempfile::TempDir;

use seg_provider::augment::{
    BlurAugmentor, BrightnessAugmentor, CastToFloat, CropAugmentor, GammaAugmentor, HueAugmentor,
    RotationAugmentor, SaturationAugmentor, TranslationAugmentor, ZoomingAugmentor,
};
use seg_provider::iterators::{RandomIterator, SequentialIterator};
use seg_provider::loaders::{LabelLoader, RawRgbLoader};
use seg_provider::{
    CombinedAugmentor, DataLoaderError, DataProvider, Dataset, PairLoader, ProviderConfig,
};

const WIDTH: u32 = 8;
const HEIGHT: u32 = 6;
const CLASSES: usize = 3;

fn label_at(sample: u32, x: u32) -> u8 {
    ((x + sample) % CLASSES as u32) as u8
}

fn write_fixtures(dir: &Path, count: u32) -> Dataset {
    (0..count)
        .map(|i| {
            let image = dir.join(format!("image_{}.png", i));
            let target = dir.join(format!("label_{}.png", i));
            RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
                Rgb([(i * 60) as u8, (x * 30) as u8, (y * 40) as u8])
            })
            .save(&image)
            .unwrap();
            GrayImage::from_fn(WIDTH, HEIGHT, |x, _| Luma([label_at(i, x)]))
                .save(&target)
                .unwrap();
            (image, target)
        })
        .collect()
}

fn loader() -> PairLoader {
    PairLoader::new(Arc::new(RawRgbLoader), Arc::new(LabelLoader))
}

fn config() -> ProviderConfig {
    ProviderConfig {
        threads: 2,
        batch_size: 2,
        num_classes: CLASSES,
    }
}

#[test]
fn epoch_of_png_pairs() {
    let dir = TempDir::new().unwrap();
    let dataset = write_fixtures(dir.path(), 4);

    let mut provider = DataProvider::new(
        dataset.clone(),
        Arc::new(SequentialIterator::new(dataset.len())),
        loader(),
        Some(Arc::new(CastToFloat)),
        config(),
    )
    .unwrap();

    assert_eq!(provider.num_batches(), 2);
    assert_eq!(provider.image_size(), (WIDTH, HEIGHT));
    assert_eq!(provider.target_size(), (WIDTH, HEIGHT));

    let plane = (WIDTH * HEIGHT) as usize;
    let mut seen = HashSet::new();
    for _ in 0..provider.num_batches() {
        let batch = provider.next_batch().unwrap();
        assert_eq!(batch.image_shape, [2, 3, HEIGHT as usize, WIDTH as usize]);
        assert_eq!(batch.target_shape, [2, CLASSES, HEIGHT as usize, WIDTH as usize]);

        for (slot, &index) in batch.indices.iter().enumerate() {
            seen.insert(index);
            let sample = index as u32;
            let image = batch.image(slot);
            let target = batch.target(slot);

            for y in 0..HEIGHT {
                for x in 0..WIDTH {
                    let k = (y * WIDTH + x) as usize;
                    assert!((image[k] - (sample * 60) as f32 / 255.0).abs() < 1e-6);
                    assert!((image[plane + k] - (x * 30) as f32 / 255.0).abs() < 1e-6);
                    assert!((image[2 * plane + k] - (y * 40) as f32 / 255.0).abs() < 1e-6);

                    let class = label_at(sample, x) as usize;
                    for c in 0..CLASSES {
                        let expected = if c == class { 1.0 } else { 0.0 };
                        assert_eq!(target[c * plane + k], expected);
                    }
                }
            }
        }
    }
    assert_eq!(seen, HashSet::from([0, 1, 2, 3]));
}

#[test]
fn augmented_random_batches() {
    let dir = TempDir::new().unwrap();
    let dataset = write_fixtures(dir.path(), 5);

    let augmentor = CombinedAugmentor::new()
        .with(CastToFloat)
        .with(GammaAugmentor::new(0.2, Some(1)).unwrap())
        .with(SaturationAugmentor::new(0.8, 1.2, Some(2)).unwrap())
        .with(HueAugmentor::new(-30.0, 30.0, Some(3)).unwrap())
        .with(BrightnessAugmentor::new(-0.1, 0.1, Some(4)).unwrap())
        .with(BlurAugmentor::new(1.0, Some(5)).unwrap())
        .with(TranslationAugmentor::new(2, Some(6)))
        .with(ZoomingAugmentor::new(0.2, Some(7)).unwrap())
        .with(RotationAugmentor::new(10.0, Some(8)).unwrap())
        .with(CropAugmentor::new(4, CLASSES, Some(9)).unwrap());

    let mut provider = DataProvider::new(
        dataset.clone(),
        Arc::new(RandomIterator::new(dataset.len(), Some(42))),
        loader(),
        Some(Arc::new(augmentor)),
        config(),
    )
    .unwrap();

    // A 5 element dataset with batches of 2 leaves one element out
    assert_eq!(provider.num_batches(), 2);
    assert_eq!(provider.image_size(), (4, 4));

    for _ in 0..4 {
        let batch = provider.next_batch().unwrap();
        assert_eq!(batch.image_shape, [2, 3, 4, 4]);
        assert!(batch.images.iter().all(|v| v.is_finite()));
        assert!(batch.indices.iter().all(|&i| i < 5));

        // At most one class fires per pixel; void pixels fire none
        for slot in 0..batch.len() {
            let target = batch.target(slot);
            for k in 0..16 {
                let fired: f32 = (0..CLASSES).map(|c| target[c * 16 + k]).sum();
                assert!(fired == 0.0 || fired == 1.0);
            }
        }
    }

    provider.reset().unwrap();
    assert!(provider.next_batch().is_ok());
}

#[test]
fn missing_file_fails_construction() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.png");
    let dataset: Dataset = vec![(missing.clone(), missing.clone())].into_iter().collect();

    let result = DataProvider::new(
        dataset,
        Arc::new(SequentialIterator::new(1)),
        loader(),
        Some(Arc::new(CastToFloat)),
        ProviderConfig {
            batch_size: 1,
            ..config()
        },
    );

    match result {
        Err(err @ DataLoaderError::ImageLoad { .. }) => {
            assert!(err.to_string().contains("missing.png"), "{}", err);
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("provider started without its files"),
    }
}

#[test]
fn uncast_images_are_rejected() {
    let dir = TempDir::new().unwrap();
    let dataset = write_fixtures(dir.path(), 2);

    let result = DataProvider::new(
        dataset,
        Arc::new(SequentialIterator::new(2)),
        loader(),
        None,
        config(),
    );
    assert!(matches!(result, Err(DataLoaderError::TypeMismatch { .. })));
}
