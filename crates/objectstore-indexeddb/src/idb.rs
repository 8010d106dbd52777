//! Promise plumbing for the callback-style IndexedDB API
//!
//! Requests and transactions report through DOM events. Each one is adapted
//! into a `js_sys::Promise` settled by the first of its success/failure
//! events, then awaited as a `wasm_bindgen_futures::JsFuture`.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Function, Promise};
use objectstore_core::{EngineError, OpenError, SchemaUpgrader};
use tracing::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    IdbDatabase, IdbFactory, IdbOpenDbRequest, IdbRequest, IdbTransaction, IdbVersionChangeEvent,
};

use crate::engine::IndexedDbUpgrade;
use crate::error::{engine_error, IndexedDbError, Result};

type EventHandler = Closure<dyn FnMut(web_sys::Event)>;

/// Handlers kept alive until one of them fires
type HandlerSlot = Rc<RefCell<Option<(EventHandler, EventHandler)>>>;

/// The `indexedDB` factory of the current global scope (window or worker).
pub fn idb_factory() -> Result<IdbFactory> {
    let value = js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str("indexedDB"))
        .map_err(|_| IndexedDbError::NotAvailable("global scope has no indexedDB".into()))?;

    if value.is_undefined() || value.is_null() {
        return Err(IndexedDbError::NotAvailable(
            "indexedDB is disabled in this context".into(),
        ));
    }

    value
        .dyn_into::<IdbFactory>()
        .map_err(|_| IndexedDbError::NotAvailable("global indexedDB is not an IDBFactory".into()))
}

/// Outcome reported by a settle callback: `Ok` resolves, `Err` rejects.
type Settlement = std::result::Result<JsValue, JsValue>;

/// Build a promise settled by whichever of two handlers fires first.
///
/// `attach` installs the success and failure handlers on the event target
/// when given `Some`, and clears them when given `None`. Both handlers are
/// detached before they are freed, so a later event on the same target never
/// reaches a dropped closure.
fn settle_on_events<F, G, A>(ok: F, err: G, attach: A) -> Promise
where
    F: Fn() -> Settlement + 'static,
    G: Fn() -> Settlement + 'static,
    A: Fn(Option<&Function>, Option<&Function>) + 'static,
{
    let mut parts = Some((ok, err, Rc::new(attach)));

    Promise::new(&mut |resolve: Function, reject: Function| {
        let Some((ok, err, attach)) = parts.take() else {
            return;
        };
        let slot: HandlerSlot = Rc::new(RefCell::new(None));

        let settle = {
            let slot = slot.clone();
            let attach = attach.clone();
            Rc::new(move |outcome: Settlement| {
                attach(None, None);
                let _ = match outcome {
                    Ok(value) => resolve.call1(&JsValue::UNDEFINED, &value),
                    Err(value) => reject.call1(&JsValue::UNDEFINED, &value),
                };
                slot.borrow_mut().take();
            })
        };

        let settle_ok = settle.clone();
        let on_ok = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            settle_ok(ok());
        }) as Box<dyn FnMut(web_sys::Event)>);

        let on_err = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            settle(err());
        }) as Box<dyn FnMut(web_sys::Event)>);

        attach(
            Some(on_ok.as_ref().unchecked_ref()),
            Some(on_err.as_ref().unchecked_ref()),
        );
        *slot.borrow_mut() = Some((on_ok, on_err));
    })
}

/// Resolves with the request's result, rejects with its DOMException.
fn request_to_promise(req: &IdbRequest) -> Promise {
    let (ok_req, err_req, target) = (req.clone(), req.clone(), req.clone());
    settle_on_events(
        move || Ok(ok_req.result().unwrap_or(JsValue::UNDEFINED)),
        move || {
            Err(err_req
                .error()
                .ok()
                .flatten()
                .map(JsValue::from)
                .unwrap_or_else(|| JsValue::from_str("request failed")))
        },
        move |on_ok, on_err| {
            target.set_onsuccess(on_ok);
            target.set_onerror(on_err);
        },
    )
}

/// Resolves with `undefined` on `complete` and with the abort reason on `abort`.
///
/// A failed request always aborts its transaction, so `abort` alone covers
/// failures. The promise never rejects: a write that fails before its
/// transaction is awaited must not leave an unhandled rejection behind.
///
/// Must be called before control returns to the event loop, or a fast
/// commit is missed.
pub(crate) fn transaction_to_promise(tx: &IdbTransaction) -> Promise {
    let (err_tx, target) = (tx.clone(), tx.clone());
    settle_on_events(
        || Ok(JsValue::UNDEFINED),
        move || {
            Ok(err_tx
                .error()
                .map(JsValue::from)
                .unwrap_or_else(|| JsValue::from_str("transaction aborted")))
        },
        move |on_complete, on_abort| {
            target.set_oncomplete(on_complete);
            target.set_onabort(on_abort);
        },
    )
}

/// Wait for a request and return its result.
pub async fn await_request(req: &IdbRequest) -> std::result::Result<JsValue, EngineError> {
    JsFuture::from(request_to_promise(req))
        .await
        .map_err(engine_error)
}

/// Wait for a promise made by [`transaction_to_promise`].
pub async fn await_transaction(done: &Promise) -> std::result::Result<(), EngineError> {
    let reason = JsFuture::from(done.clone()).await.map_err(engine_error)?;
    if reason.is_undefined() {
        Ok(())
    } else {
        Err(engine_error(reason))
    }
}

/// Open `db_name` at `version`, running `upgrader` on `upgradeneeded`.
///
/// A failing upgrade aborts the version change. The open request then fails
/// with an AbortError, which is replaced by the upgrade error itself.
pub async fn open_database(
    db_name: &str,
    version: u32,
    upgrader: SchemaUpgrader,
) -> std::result::Result<IdbDatabase, OpenError> {
    let factory = idb_factory().map_err(EngineError::from)?;
    let open_req: IdbOpenDbRequest = factory
        .open_with_u32(db_name, version)
        .map_err(engine_error)?;

    let failure: Rc<RefCell<Option<OpenError>>> = Rc::new(RefCell::new(None));
    let failure_slot = failure.clone();
    let on_upgrade = Closure::wrap(Box::new(move |event: IdbVersionChangeEvent| {
        if let Err(err) = run_upgrade(&event, &upgrader) {
            *failure_slot.borrow_mut() = Some(err);
        }
    }) as Box<dyn FnMut(IdbVersionChangeEvent)>);
    open_req.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));

    let result = await_request(open_req.unchecked_ref()).await;

    // upgradeneeded always fires before success/error, so the handler can go
    open_req.set_onupgradeneeded(None);
    drop(on_upgrade);

    if let Some(err) = failure.borrow_mut().take() {
        return Err(err);
    }

    result?
        .dyn_into::<IdbDatabase>()
        .map_err(|_| EngineError::unknown("open result is not an IDBDatabase").into())
}

fn run_upgrade(
    event: &IdbVersionChangeEvent,
    upgrader: &SchemaUpgrader,
) -> std::result::Result<(), OpenError> {
    let req: IdbOpenDbRequest = event
        .target()
        .ok_or_else(|| EngineError::unknown("upgradeneeded without a target"))?
        .unchecked_into();
    let db: IdbDatabase = req.result().map_err(engine_error)?.unchecked_into();
    let tx = req
        .transaction()
        .ok_or_else(|| EngineError::invalid_state("no version change transaction"))?;

    let old_version = event.old_version() as u32;
    let new_version = event.new_version().unwrap_or_default() as u32;
    debug!(old_version, new_version, "upgradeneeded");

    let mut upgrade = IndexedDbUpgrade::new(db, tx.clone(), old_version, new_version);
    if let Err(err) = upgrader.upgrade(&mut upgrade) {
        let _ = tx.abort();
        return Err(err.into());
    }
    Ok(())
}

/// Delete a database by name. Deleting a missing database succeeds.
pub async fn delete_database(db_name: &str) -> std::result::Result<(), EngineError> {
    let factory = idb_factory()?;
    let req = factory.delete_database(db_name).map_err(engine_error)?;
    await_request(req.unchecked_ref()).await?;
    Ok(())
}
