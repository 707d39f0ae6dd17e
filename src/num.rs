pub trait GetBit: Copy {
    fn bit(self, i: u8) -> bool;
}

macro_rules! impl_get_bit {
    ($t:ty, $limit:expr) => {
        impl GetBit for $t {
            #[inline]
            fn bit(self, i: u8) -> bool {
                debug_assert!(i < $limit);
                self & (1 << i) != 0
            }
        }
    };
}

impl_get_bit!(u8, 8);
impl_get_bit!(u16, 16);
impl_get_bit!(u32, 32);
