use sha1::Digest;
use sha1::Sha1;

/// Builds a deterministic cache key from a namespace and named fields.
///
/// Every field is length-prefixed before hashing, so `("ab", "c")` and
/// `("a", "bc")` never collide.
pub struct CacheKeyBuilder {
    hasher: Sha1,
}

impl CacheKeyBuilder {
    pub fn new(namespace: &str) -> Self {
        let mut builder = Self {
            hasher: Sha1::new(),
        };
        builder.write(namespace.as_bytes());
        builder
    }

    /// Append a named field to the key.
    pub fn field(mut self, name: &str, value: impl AsRef<[u8]>) -> Self {
        self.write(name.as_bytes());
        self.write(value.as_ref());
        self
    }

    /// Finish hashing and return the key as lowercase hex.
    pub fn finish(self) -> String {
        self.hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }
}
