//! Index-based reordering.
//!
//! All functions are pure: they return a new sequence and never touch the
//! input. An out-of-range index is not an error; drag gestures routinely
//! report a target that is already gone, so the input comes back unchanged.

/// Moves the element at `from` to position `to`, shifting the elements in
/// between by one.
pub fn move_item<T: Clone>(items: &[T], from: usize, to: usize) -> Vec<T> {
    let mut out = items.to_vec();
    if from >= items.len() || to >= items.len() || from == to {
        return out;
    }
    let item = out.remove(from);
    out.insert(to, item);
    out
}

/// Moves the element at `index` one step towards the front.
pub fn move_up<T: Clone>(items: &[T], index: usize) -> Vec<T> {
    match index.checked_sub(1) {
        Some(to) => move_item(items, index, to),
        None => items.to_vec(),
    }
}

/// Moves the element at `index` one step towards the back.
pub fn move_down<T: Clone>(items: &[T], index: usize) -> Vec<T> {
    move_item(items, index, index.saturating_add(1))
}
