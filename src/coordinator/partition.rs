use crate::model::Batch;

/// Split a batch into `parts` contiguous partitions.
///
/// Every partition but the last holds `floor(N / parts)` records; the last
/// also takes the remainder. Concatenating the partitions in order gives
/// back the input exactly. `parts` of zero is treated as one.
pub fn partition(batch: &Batch, parts: usize) -> Vec<Batch> {
    let parts = parts.max(1);
    let records = batch.records();
    let size = records.len() / parts;

    (0..parts)
        .map(|i| {
            let start = i * size;
            let end = if i + 1 == parts {
                records.len()
            } else {
                start + size
            };
            Batch::from_records(
                format!("{}#{}", batch.name(), i),
                records[start..end].to_vec(),
            )
        })
        .collect()
}
