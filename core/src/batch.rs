use crate::filter::TranslationUnit;

pub const DEFAULT_BATCH_SIZE: usize = 20;

/// A contiguous run of units from one language file, sent as one request.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    /// Zero-based position of this batch within its file.
    pub index: usize,
    pub units: &'a [TranslationUnit],
}

impl<'a> Batch<'a> {
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn sources(&self) -> Vec<String> {
        self.units.iter().map(|unit| unit.source.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Splits `units` into batches of at most `max_size`, keeping source order.
/// A `max_size` of zero is treated as one.
pub fn partition(units: &[TranslationUnit], max_size: usize) -> Vec<Batch<'_>> {
    units
        .chunks(max_size.max(1))
        .enumerate()
        .map(|(index, units)| Batch { index, units })
        .collect()
}
