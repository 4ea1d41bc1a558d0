use crate::{decode_stored_data, registry, store::KvStore, KvBackend, KvError, STORE_KEY};
use futures::Future;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc::{channel, Receiver, Sender};

/// Receiving side of a fetch: decoded records on `data`, failures on
/// `errors`. Both channels close once the background task is done.
#[derive(Debug)]
pub struct StoredDataReceiver<T> {
    pub data: Receiver<T>,
    pub errors: Receiver<KvError>,
    data_closed: bool,
    errors_closed: bool,
}

impl<T> StoredDataReceiver<T> {
    fn new(data: Receiver<T>, errors: Receiver<KvError>) -> Self {
        Self {
            data,
            errors,
            data_closed: false,
            errors_closed: false,
        }
    }

    pub fn into_parts(self) -> (Receiver<T>, Receiver<KvError>) {
        (self.data, self.errors)
    }

    /// Wait for the next item from either channel. Returns `None` once both
    /// channels are closed.
    pub async fn next(&mut self) -> Option<Result<T, KvError>> {
        loop {
            tokio::select! {
                biased;

                d = self.data.recv(), if !self.data_closed => match d {
                    Some(d) => return Some(Ok(d)),
                    None => self.data_closed = true,
                },
                e = self.errors.recv(), if !self.errors_closed => match e {
                    Some(e) => return Some(Err(e)),
                    None => self.errors_closed = true,
                },
                else => return None,
            }
        }
    }
}

impl KvBackend {
    /// Read the ACME record once. Exactly one item (record or error) is
    /// delivered, then both channels are closed.
    pub fn fetch_once<T>(&self) -> StoredDataReceiver<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.get_stored_data(false)
    }

    /// Follow the ACME record. One record is delivered per change; the
    /// channels stay open until the key disappears or the watch ends.
    pub fn fetch_and_watch<T>(&self) -> StoredDataReceiver<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.get_stored_data(true)
    }

    pub fn get_stored_data<T>(&self, watch: bool) -> StoredDataReceiver<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        spawn_fetch(connect_backend(self.clone()), watch)
    }
}

async fn connect_backend(descriptor: KvBackend) -> Result<Box<dyn KvStore>, KvError> {
    let backend = registry::register(&descriptor.name)?;
    registry::connect(backend, &descriptor.endpoints, &descriptor.config).await
}

/// Run a fetch against an already connected store.
pub fn fetch_from_store<T>(store: Box<dyn KvStore>, watch: bool) -> StoredDataReceiver<T>
where
    T: DeserializeOwned + Send + 'static,
{
    spawn_fetch(async move { Ok::<_, KvError>(store) }, watch)
}

fn spawn_fetch<T, F>(connect: F, watch: bool) -> StoredDataReceiver<T>
where
    T: DeserializeOwned + Send + 'static,
    F: Future<Output = Result<Box<dyn KvStore>, KvError>> + Send + 'static,
{
    let (data_tx, data_rx) = channel::<T>(1);
    let (err_tx, err_rx) = channel::<KvError>(1);

    tokio::spawn(async move {
        let mut store = match connect.await {
            Ok(store) => store,
            Err(e) => {
                report_error(&err_tx, e).await;
                return;
            }
        };

        if watch {
            watch_loop(store.as_mut(), &data_tx, &err_tx).await;
        } else {
            get_single(store.as_mut(), &data_tx, &err_tx).await;
        }
        // Senders are dropped here, closing both channels.
    });

    StoredDataReceiver::new(data_rx, err_rx)
}

async fn get_single<T: DeserializeOwned>(
    store: &mut dyn KvStore,
    data_tx: &Sender<T>,
    err_tx: &Sender<KvError>,
) {
    let result = match store.get(STORE_KEY).await {
        Ok(pair) => decode_stored_data::<T>(&pair.value),
        Err(e) => Err(e),
    };

    match result {
        Ok(data) => {
            if data_tx.send(data).await.is_err() {
                tracing::debug!("Stored data receiver dropped before delivery");
            }
        }
        Err(e) => report_error(err_tx, e).await,
    }
}

async fn watch_loop<T: DeserializeOwned>(
    store: &mut dyn KvStore,
    data_tx: &Sender<T>,
    err_tx: &Sender<KvError>,
) {
    let backend = store.backend();
    let mut watcher = match store.watch(STORE_KEY).await {
        Ok(w) => w,
        Err(e) => {
            report_error(err_tx, e).await;
            return;
        }
    };
    tracing::debug!("Watching key '{}' on {}", watcher.key(), backend);

    while let Some(event) = watcher.watch().await {
        let decoded = event.and_then(|pair| decode_stored_data::<T>(&pair.value));
        match decoded {
            Ok(data) => {
                if data_tx.send(data).await.is_err() {
                    tracing::debug!("Stored data receiver dropped, stopping watch");
                    return;
                }
            }
            // Decode and transport failures don't end the watch by themselves.
            Err(e) => report_error(err_tx, e).await,
        }
    }

    tracing::warn!("Watch on key '{}' ended", watcher.key());
    report_error(
        err_tx,
        KvError::KeyNotFound {
            key: STORE_KEY.to_string(),
        },
    )
    .await;
}

async fn report_error(err_tx: &Sender<KvError>, e: KvError) {
    if let Err(unsent) = err_tx.send(e).await {
        tracing::error!("Failed to fetch stored data: {}", unsent.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        encode_stored_data,
        store::{testing::ScriptedStore, KvPair, StoreWatchEvent},
        StoredData,
    };
    use serde_json::{json, Value};

    fn put(value: &Value, index: u64) -> StoreWatchEvent {
        StoreWatchEvent::Put(KvPair::new(
            STORE_KEY,
            encode_stored_data(value).unwrap(),
            index,
        ))
    }

    async fn collect<T>(mut rx: StoredDataReceiver<T>) -> (Vec<T>, Vec<KvError>) {
        let mut records = Vec::new();
        let mut errors = Vec::new();
        while let Some(item) = rx.next().await {
            match item {
                Ok(r) => records.push(r),
                Err(e) => errors.push(e),
            }
        }
        (records, errors)
    }

    #[tokio::test]
    async fn test_unsupported_backend() {
        let backend = KvBackend::builder()
            .with_name("riak")
            .with_endpoints(["127.0.0.1:8087"])
            .build();

        for watch in &[false, true] {
            let (records, errors) = collect(backend.get_stored_data::<Value>(*watch)).await;
            assert!(records.is_empty(), "Unsupported backend produced a record");
            assert_eq!(errors.len(), 1, "Exactly one error expected");
            match &errors[0] {
                KvError::UnsupportedBackend { name } => assert_eq!(name, "riak"),
                e => panic!("Unexpected error: {}", e),
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_once_round_trip() {
        let value = json!({
            "Account": { "Email": "admin@example.com", "PrivateKey": "a2V5" },
            "Certificates": [{ "Domain": { "Main": "example.com" }, "Certificate": "Y2VydA==", "Key": "a2V5" }]
        });
        let store = ScriptedStore::new(Some(encode_stored_data(&value).unwrap()));

        let mut rx = fetch_from_store::<Value>(Box::new(store), false);
        assert_eq!(rx.data.recv().await, Some(value.clone()));

        // Both channels are closed after the single result.
        assert!(rx.data.recv().await.is_none());
        assert!(rx.errors.recv().await.is_none());

        // Typed decoding of the same payload.
        let store = ScriptedStore::new(Some(encode_stored_data(&value).unwrap()));
        let (records, errors) = collect(fetch_from_store::<StoredData>(Box::new(store), false)).await;
        assert!(errors.is_empty());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].certificates[0].domain.main, "example.com");
    }

    #[tokio::test]
    async fn test_fetch_once_missing_key() {
        let store = ScriptedStore::new(None);
        let (records, errors) = collect(fetch_from_store::<Value>(Box::new(store), false)).await;

        assert!(records.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_key_not_found());
    }

    #[tokio::test]
    async fn test_fetch_once_corrupted_value() {
        let store = ScriptedStore::new(Some(b"not gzip".to_vec()));
        let (records, errors) = collect(fetch_from_store::<Value>(Box::new(store), false)).await;

        assert!(records.is_empty(), "Corrupted value must not produce a record");
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            KvError::DecompressValue { .. } => {}
            e => panic!("Unexpected error: {}", e),
        }
    }

    #[tokio::test]
    async fn test_watch_emits_in_notification_order() {
        let initial = json!({ "version": 0 });
        let (store, events) = ScriptedStore::watched(Some(encode_stored_data(&initial).unwrap()));
        let mut rx = fetch_from_store::<Value>(Box::new(store), true);

        assert_eq!(rx.data.recv().await, Some(initial));

        events
            .send(vec![put(&json!({ "version": 1 }), 2), put(&json!({ "version": 2 }), 3)])
            .unwrap();
        events.send(vec![put(&json!({ "version": 3 }), 4)]).unwrap();

        for expected in 1..=3 {
            assert_eq!(rx.data.recv().await, Some(json!({ "version": expected })));
        }

        // Watch stays open while the key exists.
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(50), rx.next())
                .await
                .is_err(),
            "Watch completed while the key still exists"
        );

        drop(events);
    }

    #[tokio::test]
    async fn test_watch_terminates_on_deleted_key() {
        let initial = json!({ "version": 0 });
        let (store, events) = ScriptedStore::watched(Some(encode_stored_data(&initial).unwrap()));
        let rx = fetch_from_store::<Value>(Box::new(store), true);

        events
            .send(vec![
                put(&json!({ "version": 1 }), 2),
                StoreWatchEvent::Delete {
                    key: STORE_KEY.to_string(),
                },
            ])
            .unwrap();
        // Events after the deletion are never seen.
        events.send(vec![put(&json!({ "version": 2 }), 3)]).unwrap();

        let (records, errors) = collect(rx).await;
        assert_eq!(records, vec![json!({ "version": 0 }), json!({ "version": 1 })]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_key_not_found());
    }

    #[tokio::test]
    async fn test_watch_survives_decode_failures() {
        let initial = json!({ "version": 0 });
        let (store, events) = ScriptedStore::watched(Some(encode_stored_data(&initial).unwrap()));
        let rx = fetch_from_store::<Value>(Box::new(store), true);

        events
            .send(vec![
                StoreWatchEvent::Put(KvPair::new(STORE_KEY, b"garbage".to_vec(), 2)),
                put(&json!({ "version": 1 }), 3),
            ])
            .unwrap();
        drop(events);

        let (records, errors) = collect(rx).await;
        assert_eq!(records, vec![json!({ "version": 0 }), json!({ "version": 1 })]);

        // Decode failure, then the end of the watch.
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], KvError::DecompressValue { .. }));
        assert!(errors[1].is_key_not_found());
    }

    #[tokio::test]
    async fn test_watch_missing_key() {
        let (store, _events) = ScriptedStore::watched(None);
        let (records, errors) = collect(fetch_from_store::<Value>(Box::new(store), true)).await;

        assert!(records.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_key_not_found());
    }
}
