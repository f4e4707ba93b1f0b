use super::config::ProviderConfig;

pub(crate) fn log_provider_info(
    dataset_len: usize,
    config: &ProviderConfig,
    image_size: (u32, u32),
    target_size: (u32, u32),
) {
    let batches = dataset_len / config.batch_size;
    let dropped = dataset_len % config.batch_size;

    tracing::info!(
        dataset_len,
        batch_size = config.batch_size,
        batches,
        dropped,
        num_classes = config.num_classes,
        threads = config.threads,
        "starting batch provider"
    );
    tracing::info!(
        image_width = image_size.0,
        image_height = image_size.1,
        target_width = target_size.0,
        target_height = target_size.1,
        "fixed batch geometry"
    );
}
