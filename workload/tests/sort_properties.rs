use proptest::prelude::*;

use workload::sort::{bubble_sort, quick_sort};

proptest! {
    #[test]
    fn bubble_sort_agrees_with_std(mut v in proptest::collection::vec(any::<i32>(), 0..200)) {
        let mut expected = v.clone();
        expected.sort_unstable();

        bubble_sort(&mut v);
        prop_assert_eq!(v, expected);
    }

    #[test]
    fn quick_sort_agrees_with_std(mut v in proptest::collection::vec(-50i32..50, 0..500)) {
        let mut expected = v.clone();
        expected.sort_unstable();

        quick_sort(&mut v);
        prop_assert_eq!(v, expected);
    }

    #[test]
    fn both_algorithms_agree(v in proptest::collection::vec(1i32..100_000, 0..300)) {
        let mut a = v.clone();
        let mut b = v;
        bubble_sort(&mut a);
        quick_sort(&mut b);
        prop_assert_eq!(a, b);
    }
}
