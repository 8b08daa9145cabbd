//! 容器解析性能基准测试

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use futures_util::future;
use iocore::{
    shapes, Arguments, Constructor, ContractType, GenericDefinition, ImplementationType, Instance, Parameter,
    Registration, ServiceContainer, ServiceLifetime, ServiceSequence,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

struct SimpleService {
    value: i32,
}

struct DependentService {
    inner: Arc<SimpleService>,
}

fn simple_container(lifetime: ServiceLifetime) -> ServiceContainer {
    let container = ServiceContainer::new();
    container
        .register_factory(ContractType::of::<SimpleService>(), |_| Ok(SimpleService { value: 42 }), lifetime, false)
        .unwrap();
    container
}

/// 基准测试：单例与瞬态解析
fn bench_lifetimes(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifetimes");

    let singleton = simple_container(ServiceLifetime::Singleton);
    let _ = singleton.get::<SimpleService>().unwrap();
    group.bench_function("singleton_hit", |b| {
        b.iter(|| black_box(singleton.get::<SimpleService>().unwrap().value))
    });

    let transient = simple_container(ServiceLifetime::Transient);
    group.bench_function("transient", |b| {
        b.iter(|| black_box(transient.get::<SimpleService>().unwrap().value))
    });

    group.finish();
}

/// 基准测试：构造函数注入
fn bench_constructor_injection(c: &mut Criterion) {
    let container = simple_container(ServiceLifetime::Singleton);
    let implementation = ImplementationType::new("DependentService").with_constructor(Constructor::new(
        [Parameter::required(ContractType::of::<SimpleService>())],
        |arguments: &Arguments| {
            Ok(DependentService {
                inner: arguments.get::<SimpleService>(0)?,
            })
        },
    ));
    container
        .register_type(
            ContractType::of::<DependentService>(),
            implementation,
            ServiceLifetime::Transient,
            false,
        )
        .unwrap();

    c.bench_function("constructor_injection", |b| {
        b.iter(|| black_box(container.get::<DependentService>().unwrap().inner.value))
    });
}

/// 基准测试：多实现序列
fn bench_sequence(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequence");
    let plugin = ContractType::named("IPlugin");

    for count in [1, 10, 100].iter() {
        let container = ServiceContainer::new();
        for i in 0..*count {
            container
                .register(
                    Registration::instance(plugin.clone(), Arc::new(i as i32))
                        .allow_multiple(true)
                        .build(),
                )
                .unwrap();
        }
        let contract = shapes::sequence_of(plugin.clone());

        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                let sequence = container.resolve_as::<ServiceSequence>(&contract).unwrap();
                let sum: i32 = sequence.collect_as::<i32>().unwrap().iter().map(|value| **value).sum();
                black_box(sum)
            })
        });
    }

    group.finish();
}

/// 基准测试：闭合泛型缓存
fn bench_closed_generic(c: &mut Criterion) {
    let repository = GenericDefinition::new("Repository", 1);
    let container = ServiceContainer::new();
    container
        .register(
            Registration::factory(repository.open(), |_, contract| Ok(Arc::new(contract.to_string()) as Instance))
                .singleton()
                .build(),
        )
        .unwrap();
    let closed = repository.close([ContractType::of::<i32>()]);

    c.bench_function("closed_generic_cached", |b| {
        b.iter(|| black_box(container.resolve(&closed).unwrap()))
    });
}

/// 基准测试：并发解析性能
fn bench_concurrent_resolution(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("concurrent_resolution");
    let container = simple_container(ServiceLifetime::Singleton);

    for concurrent_count in [10, 100].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(concurrent_count),
            concurrent_count,
            |b, &concurrent_count| {
                b.iter(|| {
                    runtime.block_on(async {
                        let tasks: Vec<_> = (0..concurrent_count)
                            .map(|_| {
                                let container = container.clone();
                                tokio::task::spawn_blocking(move || container.get::<SimpleService>().map(|s| s.value))
                            })
                            .collect();
                        black_box(future::join_all(tasks).await)
                    })
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_lifetimes,
    bench_constructor_injection,
    bench_sequence,
    bench_closed_generic,
    bench_concurrent_resolution
);
criterion_main!(benches);
