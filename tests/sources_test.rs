//! 服务源与包装形状测试

use iocore::{
    shapes, ContainerError, ContainerResult, ContractType, Deferred, ExportFactory, Instance, Metadata,
    MetadataExportFactory, MetadataView, Registration, ResolverEngine, ServiceContainer, ServiceList, ServiceSequence,
    ServiceSource,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn exporter() -> ContractType {
    ContractType::named("IExporter")
}

/// 插件元数据视图
#[derive(Debug)]
struct ExporterInfo {
    format: String,
}

impl MetadataView for ExporterInfo {
    fn from_metadata(metadata: &Metadata) -> Result<Self, String> {
        let format = metadata
            .get("format")
            .and_then(|value| value.as_str())
            .ok_or("missing 'format'")?;
        Ok(Self {
            format: format.to_string(),
        })
    }
}

fn with_exporters(formats: &[(&'static str, i64)]) -> (ServiceContainer, Arc<AtomicUsize>) {
    let container = ServiceContainer::new();
    let created = Arc::new(AtomicUsize::new(0));
    for (format, priority) in formats {
        let format = *format;
        let counter = created.clone();
        container
            .register(
                Registration::factory(exporter(), move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(format) as Instance)
                })
                .allow_multiple(true)
                .metadata("format", format)
                .priority(*priority)
                .build(),
            )
            .unwrap();
    }
    (container, created)
}

#[test]
fn test_sequence_contract_is_lazy() {
    let (container, created) = with_exporters(&[("csv", 0), ("json", 0)]);
    let sequence = container
        .resolve_as::<ServiceSequence>(&shapes::sequence_of(exporter()))
        .unwrap();

    assert_eq!(sequence.len(), 2);
    assert_eq!(created.load(Ordering::SeqCst), 0);

    let formats: Vec<&str> = sequence.collect_as::<&str>().unwrap().iter().map(|f| **f).collect();
    assert_eq!(formats, vec!["csv", "json"]);
    assert_eq!(created.load(Ordering::SeqCst), 2);
}

#[test]
fn test_sequence_over_nothing_is_empty() {
    let container = ServiceContainer::new();
    let sequence = container
        .resolve_as::<ServiceSequence>(&shapes::sequence_of(exporter()))
        .unwrap();
    assert!(sequence.is_empty());
}

#[test]
fn test_priority_ordering() {
    let (container, _) = with_exporters(&[("csv", 1), ("json", 10), ("xml", 1)]);
    let ordered: Vec<&str> = container
        .resolve_all(&exporter())
        .unwrap()
        .by_priority()
        .collect_as::<&str>()
        .unwrap()
        .iter()
        .map(|f| **f)
        .collect();
    assert_eq!(ordered, vec!["json", "csv", "xml"]);
}

#[test]
fn test_factory_creates_on_demand() {
    let container = ServiceContainer::new();
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    container
        .register(
            Registration::factory(exporter(), move |_, _| {
                Ok(Arc::new(counter.fetch_add(1, Ordering::SeqCst)) as Instance)
            })
            .transient()
            .metadata("format", "csv")
            .build(),
        )
        .unwrap();

    let factory = container
        .resolve_as::<ExportFactory>(&shapes::factory_of(exporter()))
        .unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 0);
    assert_eq!(factory.metadata().get("format").and_then(|v| v.as_str()), Some("csv"));

    assert_eq!(*factory.create_as::<usize>().unwrap(), 0);
    assert_eq!(*factory.create_as::<usize>().unwrap(), 1);
}

#[test]
fn test_metadata_factory_projects_view() {
    let (container, created) = with_exporters(&[("csv", 0), ("json", 0)]);
    container.register_metadata_view::<ExporterInfo>().unwrap();

    let element = shapes::metadata_factory_of(exporter(), ContractType::of::<ExporterInfo>());
    let factories = container
        .resolve_as::<ServiceSequence>(&shapes::sequence_of(element))
        .unwrap()
        .collect_as::<MetadataExportFactory>()
        .unwrap();

    let formats: Vec<String> = factories
        .iter()
        .map(|factory| factory.metadata_as::<ExporterInfo>().unwrap().format.clone())
        .collect();
    assert_eq!(formats, vec!["csv", "json"]);
    assert_eq!(created.load(Ordering::SeqCst), 0);

    let json = factories
        .iter()
        .find(|factory| factory.metadata_as::<ExporterInfo>().unwrap().format == "json")
        .unwrap();
    assert_eq!(*json.create_as::<&str>().unwrap(), "json");
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_metadata_factory_without_view_fails() {
    let (container, _) = with_exporters(&[("csv", 0)]);
    let contract = shapes::metadata_factory_of(exporter(), ContractType::of::<ExporterInfo>());
    assert!(matches!(
        container.resolve(&contract),
        Err(ContainerError::MetadataProjectionFailed { .. })
    ));
}

#[test]
fn test_deferred_value_is_created_once() {
    let (container, created) = with_exporters(&[("csv", 0)]);
    let deferred = container
        .resolve_as::<Deferred>(&shapes::deferred_of(exporter()))
        .unwrap();

    assert!(!deferred.is_value_created());
    assert_eq!(created.load(Ordering::SeqCst), 0);

    let first = deferred.value().unwrap();
    let second = deferred.value().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(deferred.is_value_created());
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_list_and_collection_are_snapshots() {
    let (container, created) = with_exporters(&[("csv", 0), ("json", 0)]);
    let list = container
        .resolve_as::<ServiceList>(&shapes::list_of(exporter()))
        .unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 2);

    list.remove(0);
    let again = container
        .resolve_as::<ServiceList>(&shapes::collection_of(exporter()))
        .unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(again.len(), 2);
}

/// 把 `Setting<name>` 解析为环境里的固定值
struct SettingSource {
    values: HashMap<String, String>,
}

impl SettingSource {
    fn setting(name: &str) -> ContractType {
        ContractType::named(format!("Setting:{}", name))
    }
}

impl ServiceSource for SettingSource {
    fn name(&self) -> &str {
        "Setting"
    }

    fn matches(&self, contract: &ContractType) -> bool {
        contract.name().starts_with("Setting:")
    }

    fn resolve(&self, _resolver: &ResolverEngine, contract: &ContractType) -> ContainerResult<Instance> {
        let key = contract.name().trim_start_matches("Setting:");
        self.values
            .get(key)
            .map(|value| Arc::new(value.clone()) as Instance)
            .ok_or_else(|| ContainerError::NoImplementation {
                contract: contract.to_string(),
            })
    }

    fn describe(
        &self,
        _resolver: &ResolverEngine,
        _contract: &ContractType,
    ) -> ContainerResult<Box<dyn Iterator<Item = Arc<Registration>> + Send>> {
        Ok(Box::new(std::iter::empty()))
    }
}

#[test]
fn test_custom_source_after_registrations() {
    let container = ServiceContainer::new();
    container
        .register_source(SettingSource {
            values: HashMap::from([("region".to_string(), "eu-west".to_string())]),
        })
        .unwrap();

    let region = container
        .resolve_as::<String>(&SettingSource::setting("region"))
        .unwrap();
    assert_eq!(region.as_str(), "eu-west");
    assert_eq!(container.stats().source_resolutions, 1);

    container
        .register_instance(SettingSource::setting("region"), Arc::new("us-east".to_string()), false)
        .unwrap();
    let registered = container
        .resolve_as::<String>(&SettingSource::setting("region"))
        .unwrap();
    assert_eq!(registered.as_str(), "us-east");
}

#[test]
fn test_factory_closure_can_resolve_wrappers() {
    let (container, _) = with_exporters(&[("csv", 0), ("json", 0)]);
    container
        .register_factory(
            ContractType::named("ExportRouter"),
            |resolver| {
                let sequence = resolver.resolve_as::<ServiceSequence>(&shapes::sequence_of(exporter()))?;
                Ok(sequence.len())
            },
            iocore::ServiceLifetime::Singleton,
            false,
        )
        .unwrap();

    let count = container
        .resolve_as::<usize>(&ContractType::named("ExportRouter"))
        .unwrap();
    assert_eq!(*count, 2);
}
