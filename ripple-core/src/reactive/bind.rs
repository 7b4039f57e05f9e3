//! Binding helpers.
//!
//! Thin conveniences over [`create_effect`] for pushing reactive values
//! into some external sink, such as a view property.

use super::dispose::{DisposeAction, DisposeBag};
use super::effect::create_effect;
use super::runtime::Runtime;

/// Run `render(accessor())` now and whenever the accessor's dependencies
/// change.
///
/// Only the accessor is tracked. Signals read by `render` never re-run the
/// binding.
pub fn bind<T, A, R>(runtime: &Runtime, accessor: A, mut render: R) -> DisposeAction
where
    A: Fn() -> T + Send + 'static,
    R: FnMut(T) + Send + 'static,
{
    let owner = runtime.downgrade();
    create_effect(runtime, move || {
        let value = accessor();
        match owner.upgrade() {
            Some(runtime) => runtime.untracked(|| render(value)),
            None => render(value),
        }
        None
    })
}

/// Like [`bind`], but stores the disposer in `bag` under `key`.
///
/// A previous binding under the same key is disposed first, so at most one
/// binding drives a given sink.
pub fn assign<T, A, R>(
    bag: &DisposeBag,
    key: impl Into<String>,
    runtime: &Runtime,
    accessor: A,
    render: R,
) -> DisposeAction
where
    A: Fn() -> T + Send + 'static,
    R: FnMut(T) + Send + 'static,
{
    let key = key.into();
    // Dispose the old binding before the new one renders.
    bag.remove(&key);

    let dispose = bind(runtime, accessor, render);
    bag.insert(key, dispose.clone());
    dispose
}
