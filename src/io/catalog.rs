//! Memoized, per-partition problem catalogs.
//!
//! Each partition is loaded from the [`ProblemSource`] at most once and then
//! served from memory. Loads for the same key share one in-flight future via
//! a `tokio::sync::OnceCell`; a failed load leaves the cell empty so the next
//! request retries.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use futures::future::try_join_all;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::io::source::{PartitionInfo, ProblemSource, SourceError, dedupe_records, transform_rows};
use crate::model::problem::ProblemRecord;
use crate::ops::query::distinct_topics;
use crate::util::collate::{collate, fold_name, same_name};

/// Company used for the default selection when present and nothing is configured
pub const PREFERRED_COMPANY: &str = "Google";

/// Error type for catalog operations
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("partition not found: {company} ({timeframe})")]
    PartitionNotFound { company: String, timeframe: String },
    #[error(transparent)]
    Source(SourceError),
}

impl From<SourceError> for CatalogError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotFound { company, timeframe } => {
                CatalogError::PartitionNotFound { company, timeframe }
            }
            other => CatalogError::Source(other),
        }
    }
}

/// Cache key of a partition. Company and timeframe are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PartitionKey {
    Company { company: String, timeframe: String },
    /// Every partition of the source, deduplicated
    All,
}

impl PartitionKey {
    pub fn company(company: &str, timeframe: &str) -> Self {
        PartitionKey::Company {
            company: fold_name(company),
            timeframe: fold_name(timeframe),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionKey::Company { company, timeframe } => write!(f, "{company}/{timeframe}"),
            PartitionKey::All => f.write_str("all"),
        }
    }
}

/// A loaded partition: deduplicated records in first-seen order plus the
/// distinct topics across them.
#[derive(Debug)]
pub struct Partition {
    pub key: PartitionKey,
    pub records: Arc<[Arc<ProblemRecord>]>,
    pub topics: Vec<String>,
}

impl Partition {
    pub fn from_records(key: PartitionKey, records: Vec<Arc<ProblemRecord>>) -> Self {
        let records: Arc<[Arc<ProblemRecord>]> = dedupe_records(records).into();
        let topics = distinct_topics(records.iter());
        Partition {
            key,
            records,
            topics,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Outcome of [`CatalogStore::select`]
#[derive(Debug)]
pub enum Selection {
    Committed(Arc<Partition>),
    Failed(CatalogError),
    /// Another selection became active while this one was loading
    Superseded,
}

type Cell = Arc<OnceCell<Arc<Partition>>>;

pub struct CatalogStore {
    source: Arc<dyn ProblemSource>,
    infos: Vec<PartitionInfo>,
    cells: Mutex<HashMap<PartitionKey, Cell>>,
    active: Mutex<Option<PartitionKey>>,
}

impl fmt::Debug for CatalogStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogStore")
            .field("partitions", &self.infos.len())
            .finish_non_exhaustive()
    }
}

impl CatalogStore {
    pub fn new(source: Arc<dyn ProblemSource>) -> Self {
        let infos = source.partitions();
        CatalogStore {
            source,
            infos,
            cells: Mutex::new(HashMap::new()),
            active: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    fn cell(&self, key: &PartitionKey) -> Cell {
        let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(cells.entry(key.clone()).or_default())
    }

    /// Load a partition, serving it from memory after the first success.
    pub async fn load_partition(&self, key: &PartitionKey) -> Result<Arc<Partition>, CatalogError> {
        match key {
            PartitionKey::Company { company, timeframe } => {
                self.load_company(company, timeframe).await
            }
            PartitionKey::All => {
                let cell = self.cell(key);
                let partition = cell.get_or_try_init(|| self.build_all()).await?;
                Ok(Arc::clone(partition))
            }
        }
    }

    async fn load_company(&self, company: &str, timeframe: &str) -> Result<Arc<Partition>, CatalogError> {
        let key = PartitionKey::company(company, timeframe);
        let cell = self.cell(&key);
        let partition = cell
            .get_or_try_init(|| self.build_company(company, timeframe))
            .await?;
        Ok(Arc::clone(partition))
    }

    async fn build_company(&self, company: &str, timeframe: &str) -> Result<Arc<Partition>, CatalogError> {
        let info = self.resolve(company, timeframe).ok_or_else(|| CatalogError::PartitionNotFound {
            company: company.to_string(),
            timeframe: timeframe.to_string(),
        })?;
        let key = PartitionKey::company(&info.company, &info.timeframe);

        debug!(partition = %key, "loading partition");
        let rows = self
            .source
            .fetch_rows(&info.company, &info.timeframe)
            .await
            .inspect_err(|e| warn!(partition = %key, error = %e, "partition load failed"))?;
        let records = transform_rows(&rows, &info.company, &info.timeframe)
            .into_iter()
            .map(Arc::new)
            .collect();
        let partition = Partition::from_records(key.clone(), records);
        info!(partition = %key, records = partition.len(), "partition loaded");
        Ok(Arc::new(partition))
    }

    /// Every member partition, loaded concurrently and concatenated in
    /// source order before deduplication.
    async fn build_all(&self) -> Result<Arc<Partition>, CatalogError> {
        let loads = self
            .infos
            .iter()
            .map(|info| self.load_company(&info.company, &info.timeframe));
        let members = try_join_all(loads).await?;
        let records = members
            .iter()
            .flat_map(|member| member.records.iter().cloned())
            .collect();
        let partition = Partition::from_records(PartitionKey::All, records);
        info!(records = partition.len(), "aggregate catalog loaded");
        Ok(Arc::new(partition))
    }

    /// The partition for `key` if it has already been loaded.
    pub fn cached(&self, key: &PartitionKey) -> Option<Arc<Partition>> {
        let cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.get(key).and_then(|cell| cell.get().cloned())
    }

    // -----------------------------------------------------------------------
    // Active selection
    // -----------------------------------------------------------------------

    /// Make `key` the active selection and load it. A load that finishes
    /// after a newer selection was made reports `Superseded`.
    pub async fn select(&self, key: &PartitionKey) -> Selection {
        self.set_active(key.clone());
        self.load_selected(key).await
    }

    /// Load `key`, which the caller already marked active. Lets a caller
    /// record the selection synchronously and run the load elsewhere.
    pub async fn load_selected(&self, key: &PartitionKey) -> Selection {
        let result = self.load_partition(key).await;
        if !self.is_active(key) {
            debug!(partition = %key, "discarding superseded load");
            return Selection::Superseded;
        }
        match result {
            Ok(partition) => Selection::Committed(partition),
            Err(err) => Selection::Failed(err),
        }
    }

    pub fn set_active(&self, key: PartitionKey) {
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = Some(key);
    }

    pub fn active(&self) -> Option<PartitionKey> {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_active(&self, key: &PartitionKey) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|active| active == key)
    }

    // -----------------------------------------------------------------------
    // Source metadata
    // -----------------------------------------------------------------------

    /// Source metadata for a partition, matched by folded name.
    pub fn resolve(&self, company: &str, timeframe: &str) -> Option<&PartitionInfo> {
        self.infos
            .iter()
            .find(|info| same_name(&info.company, company) && same_name(&info.timeframe, timeframe))
    }

    /// Distinct companies in collation order.
    pub fn companies(&self) -> Vec<String> {
        let mut companies: Vec<String> = Vec::new();
        for info in &self.infos {
            if !companies.contains(&info.company) {
                companies.push(info.company.clone());
            }
        }
        companies.sort_by(|a, b| collate(a, b));
        companies
    }

    /// A company's timeframes in file order.
    pub fn timeframes_for(&self, company: &str) -> Vec<String> {
        let mut infos: Vec<&PartitionInfo> = self
            .infos
            .iter()
            .filter(|info| same_name(&info.company, company))
            .collect();
        infos.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| collate(&a.timeframe, &b.timeframe)));
        infos.into_iter().map(|info| info.timeframe.clone()).collect()
    }

    /// Every timeframe across companies, ordered by its lowest file order.
    pub fn all_timeframes(&self) -> Vec<String> {
        let mut orders: BTreeMap<&str, u64> = BTreeMap::new();
        for info in &self.infos {
            let order = orders.entry(info.timeframe.as_str()).or_insert(info.order);
            *order = (*order).min(info.order);
        }
        let mut timeframes: Vec<(&str, u64)> = orders.into_iter().collect();
        timeframes.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| collate(a.0, b.0)));
        timeframes.into_iter().map(|(t, _)| t.to_string()).collect()
    }

    /// Initial (company, timeframe): the configured pair when it exists,
    /// otherwise the preferred company or the first one, with its first
    /// timeframe.
    pub fn default_selection(
        &self,
        company: Option<&str>,
        timeframe: Option<&str>,
    ) -> Option<(String, String)> {
        let companies = self.companies();
        let company = company
            .and_then(|c| companies.iter().find(|known| same_name(known, c)))
            .or_else(|| companies.iter().find(|c| c.as_str() == PREFERRED_COMPANY))
            .or_else(|| companies.first())?
            .clone();
        let timeframes = self.timeframes_for(&company);
        let timeframe = timeframe
            .and_then(|t| timeframes.iter().find(|known| same_name(known, t)))
            .or_else(|| timeframes.first())?
            .clone();
        Some((company, timeframe))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::source::{MemorySource, RawProblemRow, raw_row};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn rows(titles: &[(&str, &str)]) -> Vec<RawProblemRow> {
        titles
            .iter()
            .map(|(title, link)| raw_row(title, "MEDIUM", link, "Array, Graph"))
            .collect()
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with_partition("Google", "Thirty Days", rows(&[("Two Sum", "l/two-sum"), ("LRU", "l/lru")]))
            .with_partition("Google", "All", rows(&[("Two Sum", "l/two-sum"), ("Trie", "")]))
            .with_partition("Amazon", "Thirty Days", rows(&[("LRU", "L/LRU"), ("Heap", "l/heap")]))
    }

    fn make_store(source: MemorySource) -> (Arc<MemorySource>, CatalogStore) {
        let source = Arc::new(source);
        let store = CatalogStore::new(source.clone());
        (source, store)
    }

    #[tokio::test]
    async fn repeat_loads_hit_the_cache() {
        let (source, store) = make_store(source());
        let key = PartitionKey::company("google", "thirty days");
        assert!(store.cached(&key).is_none());

        let first = store.load_partition(&key).await.unwrap();
        let second = store.load_partition(&key).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.fetch_count(), 1);
        assert!(store.cached(&key).is_some());
        assert_eq!(first.records[0].company, "Google");
        assert_eq!(first.topics, vec!["Array".to_string(), "Graph".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() {
        let (source, store) = make_store(source().with_delay(Duration::from_millis(20)));
        let key = PartitionKey::company("Google", "Thirty Days");
        let (a, b) = tokio::join!(store.load_partition(&key), store.load_partition(&key));
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn missing_partition_is_not_cached() {
        let (source, store) = make_store(source());
        let key = PartitionKey::company("Google", "Six Months");
        let err = store.load_partition(&key).await.unwrap_err();
        assert!(matches!(err, CatalogError::PartitionNotFound { .. }));
        assert!(store.cached(&key).is_none());
        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn aggregate_dedupes_across_partitions() {
        let (source, store) = make_store(source());
        let all = store.load_partition(&PartitionKey::All).await.unwrap();
        let titles: Vec<&str> = all.records.iter().map(|r| r.title.as_str()).collect();
        // Source order, first occurrence wins.
        assert_eq!(titles, vec!["Two Sum", "LRU", "Trie", "Heap"]);
        assert_eq!(source.fetch_count(), 3);

        // Members were cached on the way through.
        store
            .load_partition(&PartitionKey::company("Amazon", "Thirty Days"))
            .await
            .unwrap();
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test]
    async fn aggregate_loads_members_concurrently() {
        let (source, store) = make_store(source().with_delay(Duration::from_millis(20)));
        let all = store.load_partition(&PartitionKey::All).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(source.fetch_count(), 3);
        assert_eq!(source.peak_in_flight(), 3);
    }

    #[tokio::test]
    async fn names_fold_beyond_ascii() {
        let (source, store) = make_store(
            MemorySource::new().with_partition("Ørsted", "Thirty Days", rows(&[("Two Sum", "l/two-sum")])),
        );
        assert_eq!(store.resolve("ØRSTED", "thirty days").map(|i| i.company.as_str()), Some("Ørsted"));
        assert_eq!(store.timeframes_for("øRSTED"), vec!["Thirty Days".to_string()]);

        let partition = store
            .load_partition(&PartitionKey::company("ØRSTED", "THIRTY DAYS"))
            .await
            .unwrap();
        assert_eq!(partition.records[0].company, "Ørsted");
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn superseded_selection_is_discarded() {
        let (_source, store) = make_store(source().with_delay(Duration::from_millis(50)));
        let store = Arc::new(store);
        let slow = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .select(&PartitionKey::company("Google", "Thirty Days"))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let latest = store
            .select(&PartitionKey::company("Amazon", "Thirty Days"))
            .await;

        assert!(matches!(slow.await.unwrap(), Selection::Superseded));
        assert!(matches!(latest, Selection::Committed(_)));
        assert_eq!(
            store.active(),
            Some(PartitionKey::company("Amazon", "Thirty Days"))
        );
    }

    #[tokio::test]
    async fn failed_selection_reports_error() {
        let (_source, store) = make_store(source());
        let selection = store.select(&PartitionKey::company("Nope", "All")).await;
        assert!(matches!(
            selection,
            Selection::Failed(CatalogError::PartitionNotFound { .. })
        ));
    }

    #[test]
    fn metadata_ordering() {
        let (_source, store) = make_store(source());
        assert_eq!(store.companies(), vec!["Amazon".to_string(), "Google".to_string()]);
        assert_eq!(
            store.timeframes_for("google"),
            vec!["Thirty Days".to_string(), "All".to_string()]
        );
        assert_eq!(
            store.all_timeframes(),
            vec!["Thirty Days".to_string(), "All".to_string()]
        );
    }

    #[test]
    fn default_selection_prefers_config_then_google() {
        let (_source, store) = make_store(source());
        assert_eq!(
            store.default_selection(None, None),
            Some(("Google".to_string(), "Thirty Days".to_string()))
        );
        assert_eq!(
            store.default_selection(Some("amazon"), None),
            Some(("Amazon".to_string(), "Thirty Days".to_string()))
        );
        assert_eq!(
            store.default_selection(Some("Unknown"), Some("all")),
            Some(("Google".to_string(), "All".to_string()))
        );

        let (_source, empty) = make_store(MemorySource::new());
        assert_eq!(empty.default_selection(None, None), None);
    }
}
