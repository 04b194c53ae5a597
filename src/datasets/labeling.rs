/// Maps the 4 digit numeric prefix of a sample's filename to a class index.
pub trait LabelRule: Send + Sync {
    fn label(&self, prefix: u32) -> usize;
}

impl<F> LabelRule for F
where
    F: Fn(u32) -> usize + Send + Sync,
{
    fn label(&self, prefix: u32) -> usize {
        self(prefix)
    }
}

/// Buckets prefixes into consecutive classes of `bucket` files each, then
/// shifts every class at or above `reserved` up by one.
///
/// The default (50 per class, index 6 reserved) is a fixed convention of the
/// folder layout this tool was written for, where class 6 is excluded from
/// the custom test set. It is not a general rule; other datasets should
/// supply their own [`LabelRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedClassSkip {
    pub bucket: u32,
    pub reserved: usize,
}

impl Default for ReservedClassSkip {
    fn default() -> Self {
        Self {
            bucket: 50,
            reserved: 6,
        }
    }
}

impl LabelRule for ReservedClassSkip {
    fn label(&self, prefix: u32) -> usize {
        let raw = (prefix / self.bucket.max(1)) as usize;
        if raw >= self.reserved {
            raw + 1
        } else {
            raw
        }
    }
}

/// Parses the leading 4 ASCII digits of `name`.
pub fn parse_prefix(name: &str) -> Option<u32> {
    let prefix = name.get(..4)?;
    if !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}
