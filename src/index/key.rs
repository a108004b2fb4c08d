//! Fixed-width, totally ordered index keys.

use std::fmt::Debug;

/// A key that can be stored in an index page.
///
/// Keys are encoded at a fixed width so entries pack contiguously and a
/// page's capacity can be derived from its layout alone. The encoding does
/// not need to be order-preserving; pages always compare decoded keys.
pub trait IndexKey: Ord + Clone + Debug + Send + Sync + 'static {
    /// Encoded width in bytes.
    const ENCODED_LEN: usize;

    /// Write the key into `out[..Self::ENCODED_LEN]`.
    fn encode(&self, out: &mut [u8]);

    /// Read a key from `bytes[..Self::ENCODED_LEN]`.
    fn decode(bytes: &[u8]) -> Self;
}

macro_rules! impl_index_key_for_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IndexKey for $ty {
                const ENCODED_LEN: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn encode(&self, out: &mut [u8]) {
                    out[..Self::ENCODED_LEN].copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn decode(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::ENCODED_LEN]);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_index_key_for_int!(i32, i64, u32, u64);

/// Composite keys order lexicographically, first component first.
impl<A: IndexKey, B: IndexKey> IndexKey for (A, B) {
    const ENCODED_LEN: usize = A::ENCODED_LEN + B::ENCODED_LEN;

    fn encode(&self, out: &mut [u8]) {
        self.0.encode(&mut out[..A::ENCODED_LEN]);
        self.1.encode(&mut out[A::ENCODED_LEN..Self::ENCODED_LEN]);
    }

    fn decode(bytes: &[u8]) -> Self {
        (
            A::decode(&bytes[..A::ENCODED_LEN]),
            B::decode(&bytes[A::ENCODED_LEN..Self::ENCODED_LEN]),
        )
    }
}
