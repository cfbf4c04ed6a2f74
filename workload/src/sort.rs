use rand::Rng;

/// Random values in `[1, 100_000)`.
pub fn random_array<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<i32> {
    (0..len).map(|_| rng.gen_range(1..100_000)).collect()
}

/// O(n²) exchange sort.
pub fn bubble_sort(arr: &mut [i32]) {
    let n = arr.len();
    if n < 2 {
        return;
    }
    for i in 0..n - 1 {
        for j in 0..n - i - 1 {
            if arr[j] > arr[j + 1] {
                arr.swap(j, j + 1);
            }
        }
    }
}

/// In-place quicksort, Lomuto partition with the last element as pivot.
pub fn quick_sort(arr: &mut [i32]) {
    if arr.len() < 2 {
        return;
    }
    let p = partition(arr);
    let (left, right) = arr.split_at_mut(p);
    quick_sort(left);
    quick_sort(&mut right[1..]);
}

fn partition(arr: &mut [i32]) -> usize {
    let high = arr.len() - 1;
    let pivot = arr[high];
    let mut store = 0;

    for j in 0..high {
        if arr[j] < pivot {
            arr.swap(store, j);
            store += 1;
        }
    }
    arr.swap(store, high);
    store
}

/// Sorts independent copies of `data` with both algorithms.
///
/// Returns a checksum combining the extremes of both results.
pub fn combined_sort(data: &[i32]) -> u64 {
    let mut bubbled = data.to_vec();
    bubble_sort(&mut bubbled);

    let mut quick = data.to_vec();
    quick_sort(&mut quick);

    let edge = |v: &[i32]| {
        v.first().copied().unwrap_or_default() as u64 + v.last().copied().unwrap_or_default() as u64
    };
    edge(&bubbled) + edge(&quick)
}
