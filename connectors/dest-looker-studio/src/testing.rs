//! Seeded store, scripted reader and cache for data service tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use martflow_engine::ReportDataCache;
use martflow_sdk::capability::{BackendResult, ReportReader};
use martflow_sdk::registry::Capabilities;
use martflow_sdk::resolver::BackendComponent;
use martflow_state::{ReportStore, SqliteReportStore};
use martflow_types::backend::{DestinationType, StorageType};
use martflow_types::config::{
    AthenaConfig, AthenaCredentials, DestinationConfig, DestinationCredentials, EmailConfig,
    EmailCredentials, LookerStudioConfig, LookerStudioCredentials, StorageConfig,
    StorageCredentials,
};
use martflow_types::definition::DataMartDefinition;
use martflow_types::entity::{
    DataMart, DataMartId, Destination, DestinationId, Report, ReportContext, ReportId,
    ReportRunState,
};
use martflow_types::reader_state::ReaderState;
use martflow_types::report::{ReportDataBatch, ReportDataDescription, ReportDataHeader, Row};
use martflow_types::schema::{AthenaFieldType, NativeFieldType};

use crate::service::LookerStudioDataService;

pub(crate) const REPORT: &str = "rep-looker";
pub(crate) const KEYLESS_REPORT: &str = "rep-keyless";
pub(crate) const EMAIL_REPORT: &str = "rep-mail";
pub(crate) const SECRET: &str = "Ab3dEf6hIj9lMn2pQr5tUv8xYz1bCd4f";

fn headers() -> Vec<ReportDataHeader> {
    let header = |name: &str, field_type| ReportDataHeader {
        name: name.into(),
        alias: None,
        description: None,
        field_type: NativeFieldType::Athena { field_type },
    };
    vec![
        header("region", AthenaFieldType::Varchar),
        header("day", AthenaFieldType::Date),
        header("revenue", AthenaFieldType::Decimal),
    ]
}

fn rows() -> Vec<Row> {
    vec![
        vec![json!("EU"), json!("2025-03-01"), json!("10.5")],
        vec![json!("US"), json!("2025-03-02"), json!("7")],
        vec![json!("APAC"), json!("2025-03-03"), json!("3.25")],
    ]
}

/// Offset-cursor reader over a fixed result set.
struct StaticReader {
    prepares: Arc<AtomicUsize>,
}

impl BackendComponent for StaticReader {
    type Kind = StorageType;

    fn backend_type(&self) -> StorageType {
        StorageType::Athena
    }
}

#[async_trait]
impl ReportReader for StaticReader {
    async fn prepare_report_data(
        &mut self,
        _context: &ReportContext,
    ) -> BackendResult<ReportDataDescription> {
        self.prepares.fetch_add(1, Ordering::SeqCst);
        Ok(ReportDataDescription::new(headers()))
    }

    async fn read_report_data_batch(
        &mut self,
        cursor: Option<&str>,
        max_rows: Option<usize>,
    ) -> BackendResult<ReportDataBatch> {
        let all = rows();
        let start = cursor.map_or(0, |c| c.parse().unwrap());
        let end = max_rows.map_or(all.len(), |n| (start + n).min(all.len()));
        let next = (end < all.len()).then(|| end.to_string());
        Ok(ReportDataBatch::new(all[start..end].to_vec(), next))
    }

    async fn finalize(&mut self) -> BackendResult<()> {
        Ok(())
    }

    fn state(&self) -> Option<ReaderState> {
        None
    }

    fn init_from_state(
        &mut self,
        _state: ReaderState,
        _headers: Vec<ReportDataHeader>,
    ) -> BackendResult<()> {
        Ok(())
    }
}

pub(crate) struct Fixture {
    pub service: LookerStudioDataService,
    prepares: Arc<AtomicUsize>,
}

impl Fixture {
    pub fn prepares(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }
}

fn report(id: &str, destination: &Destination, config: DestinationConfig) -> Report {
    Report {
        id: ReportId::new(id),
        title: "Revenue by day".into(),
        data_mart_id: DataMartId::new("dm-revenue"),
        destination_id: destination.id.clone(),
        destination_config: config,
        run: ReportRunState::default(),
    }
}

pub(crate) fn seeded() -> Fixture {
    let store = SqliteReportStore::in_memory().unwrap();
    store
        .save_data_mart(&DataMart {
            id: DataMartId::new("dm-revenue"),
            title: "Revenue".into(),
            storage_type: StorageType::Athena,
            definition: DataMartDefinition::Table {
                fully_qualified_name: "finance.daily_revenue".into(),
            },
            config: StorageConfig::Athena(AthenaConfig {
                region: "eu-west-1".into(),
                output_bucket: "results".into(),
            }),
            credentials: StorageCredentials::Athena(AthenaCredentials {
                access_key_id: "AKIA".into(),
                secret_access_key: "secret".into(),
            }),
            schema: None,
        })
        .unwrap();

    let looker = |id: &str, key: Option<&str>| Destination {
        id: DestinationId::new(id),
        title: "Dashboards".into(),
        destination_type: DestinationType::LookerStudio,
        credentials: DestinationCredentials::LookerStudio(LookerStudioCredentials {
            destination_secret_key: key.map(str::to_string),
        }),
    };
    let keyed = looker("dst-looker", Some(SECRET));
    let keyless = looker("dst-keyless", None);
    let mail = Destination {
        id: DestinationId::new("dst-mail"),
        title: "Mail".into(),
        destination_type: DestinationType::Email,
        credentials: DestinationCredentials::Email(EmailCredentials {
            sender_address: "reports@acme.test".into(),
        }),
    };
    let lifetime = DestinationConfig::LookerStudio(LookerStudioConfig {
        cache_lifetime_secs: Some(300),
    });
    for destination in [&keyed, &keyless, &mail] {
        store.save_destination(destination).unwrap();
    }
    store.save_report(&report(REPORT, &keyed, lifetime.clone())).unwrap();
    store.save_report(&report(KEYLESS_REPORT, &keyless, lifetime)).unwrap();
    store
        .save_report(&report(
            EMAIL_REPORT,
            &mail,
            DestinationConfig::Email(EmailConfig {
                recipients: vec!["finance@acme.test".into()],
                subject: "Revenue".into(),
            }),
        ))
        .unwrap();

    let prepares = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&prepares);
    let mut builder = Capabilities::builder();
    builder.report_reader(move || {
        Ok(Box::new(StaticReader {
            prepares: Arc::clone(&counter),
        }) as Box<dyn ReportReader>)
    });
    let capabilities = Arc::new(builder.build().unwrap());

    let store: Arc<dyn ReportStore> = Arc::new(store);
    let cache = ReportDataCache::new(
        Arc::clone(&store),
        capabilities,
        Duration::from_secs(3_600),
    );
    Fixture {
        service: LookerStudioDataService::new(store, cache),
        prepares,
    }
}
