use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc, Barrier,
    },
    thread,
    time::Duration,
};
use vessel::{Config, Container, Context, Instance, InstantiateErrorKind, ResolveErrorKind};

const THREADS: usize = 16;

struct Pool;

fn run<T: Send + 'static>(container: &Container, resolve: fn(&Container) -> T) -> Vec<T> {
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                resolve(&container)
            })
        })
        .collect();

    handles.into_iter().map(|handle| handle.join().unwrap()).collect()
}

#[test]
fn test_singleton_created_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    container
        .register(
            "pool",
            {
                let calls = calls.clone();
                move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                    Ok(Instance::new(Pool))
                }
            },
            Config::singleton(),
        )
        .unwrap();

    let instances = run(&container, |container| container.resolve("pool").unwrap());

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(instances.iter().all(|instance| instance.ptr_eq(&instances[0])));
}

#[test]
fn test_constructor_created_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    container
        .provide({
            let calls = calls.clone();
            move || -> Result<Pool, InstantiateErrorKind> {
                calls.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
                Ok(Pool)
            }
        })
        .register()
        .unwrap();

    let pools = run(&container, |container| container.inject::<Pool>().unwrap());

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(pools.iter().all(|pool| Arc::ptr_eq(pool, &pools[0])));
}

#[test]
fn test_transient_created_per_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    container
        .register(
            "pool",
            {
                let calls = calls.clone();
                move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Instance::new(Pool))
                }
            },
            Config::transient(),
        )
        .unwrap();

    run(&container, |container| container.resolve("pool").unwrap());

    assert_eq!(calls.load(Ordering::SeqCst), THREADS);
}

#[test]
fn test_concurrent_start() {
    let container = Container::new();
    for name in ["a", "b", "c"] {
        container
            .register(name, |_| Ok(Instance::new(Pool)), Config::singleton())
            .unwrap();
    }

    run(&container, |container| container.start(&Context::new()).unwrap());

    assert!(container.is_running());
    assert!(["a", "b", "c"].iter().all(|name| container.is_started(name)));
}

#[test]
fn test_scopes_are_independent() {
    let container = Container::new();
    container
        .register("request", |_| Ok(Instance::new(Pool)), Config::scoped())
        .unwrap();

    let instances = run(&container, |container| {
        let scope = container.begin_scope();
        let first = scope.resolve("request").unwrap();
        assert!(first.ptr_eq(&scope.resolve("request").unwrap()));
        first
    });

    for (index, instance) in instances.iter().enumerate() {
        assert!(instances[index + 1..].iter().all(|other| !other.ptr_eq(instance)));
    }
}

struct Left(#[allow(dead_code)] Arc<Right>);
struct Right(#[allow(dead_code)] Arc<Left>);

/// Runs both resolutions at once and waits a bounded time for each result
fn run_pair<T: Send + 'static>(
    container: &Container,
    resolvers: [fn(&Container) -> Result<T, ResolveErrorKind>; 2],
) -> Vec<Result<T, ResolveErrorKind>> {
    let barrier = Arc::new(Barrier::new(2));
    let (sender, receiver) = mpsc::channel();
    for resolve in resolvers {
        let container = container.clone();
        let barrier = barrier.clone();
        let sender = sender.clone();
        thread::spawn(move || {
            barrier.wait();
            let _ = sender.send(resolve(&container));
        });
    }

    (0..2)
        .map(|_| {
            receiver
                .recv_timeout(Duration::from_secs(5))
                .expect("cross-thread cycle blocked")
        })
        .collect()
}

#[test]
fn test_constructor_cycle_across_threads() {
    let container = Container::new();
    container
        .provide(|container: Container| -> Result<Left, InstantiateErrorKind> {
            thread::sleep(Duration::from_millis(200));
            Ok(Left(container.inject::<Right>()?))
        })
        .register()
        .unwrap();
    container
        .provide(|container: Container| -> Result<Right, InstantiateErrorKind> {
            thread::sleep(Duration::from_millis(200));
            Ok(Right(container.inject::<Left>()?))
        })
        .register()
        .unwrap();

    let results = run_pair(
        &container,
        [
            |container| container.inject::<Left>().map(|_| ()),
            |container| container.inject::<Right>().map(|_| ()),
        ],
    );

    for result in results {
        let err = result.unwrap_err();
        assert!(err.find_cycle().is_some(), "{err}");
    }
}

#[test]
fn test_service_cycle_across_threads() {
    let container = Container::new();
    container
        .register(
            "left",
            |container| {
                thread::sleep(Duration::from_millis(200));
                container.resolve("right")?;
                Ok(Instance::new(Pool))
            },
            Config::singleton(),
        )
        .unwrap();
    container
        .register(
            "right",
            |container| {
                thread::sleep(Duration::from_millis(200));
                container.resolve("left")?;
                Ok(Instance::new(Pool))
            },
            Config::singleton(),
        )
        .unwrap();

    let results = run_pair(
        &container,
        [
            |container| container.resolve("left").map(|_| ()),
            |container| container.resolve("right").map(|_| ()),
        ],
    );

    for result in results {
        let err = result.unwrap_err();
        assert!(err.find_cycle().is_some(), "{err}");
    }
}
