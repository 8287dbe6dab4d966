// Integration tests for the pooled decorators

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use threaded::{
    threadpooled, BlockingPooled, CallWrapper, Decorator, ExecutorHandle, ExecutorKind, LoopGetter, PoolError,
    Pooled, TaskError, ThreadPooled,
};
use tokio::runtime::Handle;

fn isolated(kind: ExecutorKind, capacity: usize) -> Arc<ExecutorHandle> {
    let handle = Arc::new(ExecutorHandle::new(kind));
    handle.configure(Some(capacity)).unwrap();
    handle
}

fn current_thread_name(_: ()) -> Option<String> {
    thread::current().name().map(str::to_string)
}

#[test]
fn test_call_runs_off_caller_thread() {
    let handle = isolated(ExecutorKind::ThreadPool, 2);
    let wrapper = Pooled::new(handle.clone()).decorate(|_: ()| thread::current().id());

    let call = wrapper.call(());
    assert!(!call.is_loop_task());
    let worker_id = call.wait().unwrap();

    assert_ne!(worker_id, thread::current().id());
    handle.shutdown();
}

#[test]
fn test_blocking_pool_runs_off_caller_thread() {
    let handle = isolated(ExecutorKind::BlockingPool, 2);
    let wrapper = Pooled::new(handle.clone()).decorate(|_: ()| thread::current().id());

    assert_ne!(wrapper.call(()).wait().unwrap(), thread::current().id());
    handle.shutdown();
}

#[test]
fn test_bare_and_configured_decoration_are_equivalent() {
    let bare = threadpooled(current_thread_name);
    let configured = ThreadPooled::new().decorate(current_thread_name);

    let bare_name = bare.call(()).wait().unwrap().unwrap();
    let configured_name = configured.call(()).wait().unwrap().unwrap();

    assert!(bare_name.starts_with("threadpooled-worker"));
    assert!(configured_name.starts_with("threadpooled-worker"));
    assert!(Arc::ptr_eq(bare.handle(), configured.handle()));
}

#[test]
fn test_arguments_and_results_are_relayed() -> anyhow::Result<()> {
    let handle = isolated(ExecutorKind::ThreadPool, 2);
    handle.configure(Some(2))?;
    let wrapper = Pooled::new(handle.clone()).decorate(|(a, b): (i32, i32)| a.checked_div(b));

    assert_eq!(wrapper.call((84, 2)).wait()?, Some(42));
    assert_eq!(wrapper.call((1, 0)).wait()?, None);
    handle.shutdown();
    Ok(())
}

#[test]
fn test_panic_surfaces_through_future() {
    let handle = isolated(ExecutorKind::ThreadPool, 1);
    let wrapper = Pooled::new(handle.clone()).decorate(|fail: bool| {
        if fail {
            panic!("target failed");
        }
        "ok"
    });

    assert_eq!(
        wrapper.call(true).wait(),
        Err(TaskError::Panicked("target failed".to_string()))
    );
    // The worker survives the panic.
    assert_eq!(wrapper.call(false).wait(), Ok("ok"));
    handle.shutdown();
}

#[test]
fn test_async_target_is_bridged_on_worker() {
    let handle = isolated(ExecutorKind::ThreadPool, 2);
    let wrapper = Pooled::new(handle.clone()).decorate_async(|x: u64| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        x * 2
    });

    assert_eq!(wrapper.call(21).wait(), Ok(42));
    handle.shutdown();
}

#[test]
fn test_capacity_bounds_concurrency() {
    let handle = isolated(ExecutorKind::ThreadPool, 2);
    let wrapper = Pooled::new(handle.clone()).decorate(|_: usize| {
        thread::sleep(Duration::from_millis(20));
        thread::current().name().map(str::to_string)
    });

    let calls: Vec<_> = (0..8).map(|i| wrapper.call(i)).collect();
    let mut names: Vec<String> = calls.into_iter().map(|call| call.wait().unwrap().unwrap()).collect();
    names.sort();
    names.dedup();

    assert!(names.len() <= 2);
    handle.shutdown();
}

#[test]
fn test_calls_run_side_by_side_up_to_capacity() {
    let handle = isolated(ExecutorKind::ThreadPool, 4);
    let warm = Pooled::new(handle.clone()).decorate(|_: ()| ());
    warm.call(()).wait().unwrap();

    for _ in 0..10 {
        // Each call only returns true once every call of the round has arrived.
        let arrived = Arc::new(AtomicUsize::new(0));
        let meet = Pooled::new(handle.clone()).decorate(move |expected: usize| {
            arrived.fetch_add(1, Ordering::SeqCst);
            let deadline = Instant::now() + Duration::from_secs(5);
            while arrived.load(Ordering::SeqCst) < expected {
                if Instant::now() > deadline {
                    return false;
                }
                thread::sleep(Duration::from_millis(1));
            }
            true
        });

        let calls: Vec<_> = (0..2).map(|_| meet.call(2)).collect();
        for call in calls {
            assert_eq!(call.wait(), Ok(true));
        }
    }
    handle.shutdown();
}

#[test]
fn test_queued_blocking_call_abandoned_on_shutdown() {
    let handle = isolated(ExecutorKind::BlockingPool, 1);
    let (started_tx, started_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Arc::new(std::sync::Mutex::new(release_rx));
    let blocker = Pooled::new(handle.clone()).decorate(move |_: ()| {
        let _ = started_tx.send(());
        let _ = release_rx.lock().unwrap().recv_timeout(Duration::from_secs(5));
        1
    });
    let wrapper = Pooled::new(handle.clone()).decorate(|x: i32| x);

    let running = blocker.call(());
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    let queued = wrapper.call(2);
    handle.shutdown();
    release_tx.send(()).unwrap();

    assert_eq!(running.wait(), Ok(1));
    assert_eq!(queued.wait(), Err(TaskError::Abandoned));
}

#[test]
fn test_cancel_queued_call() {
    let handle = isolated(ExecutorKind::ThreadPool, 1);
    let (release, gate) = mpsc::channel::<()>();
    let gate = Arc::new(std::sync::Mutex::new(gate));
    let blocker = Pooled::new(handle.clone()).decorate(move |_: ()| {
        let _ = gate.lock().unwrap().recv();
    });
    let wrapper = Pooled::new(handle.clone()).decorate(|x: u8| x);

    let running = blocker.call(());
    let queued = wrapper.call(1);
    assert!(queued.cancel());

    release.send(()).unwrap();
    assert_eq!(running.wait(), Ok(()));
    assert_eq!(queued.wait(), Err(TaskError::Cancelled));
    handle.shutdown();
}

#[test]
fn test_submit_to_shut_down_executor_fails() {
    let handle = isolated(ExecutorKind::ThreadPool, 1);
    let executor = handle.get_executor().unwrap();
    handle.shutdown();

    let refused = executor.submit(|| Ok(1));
    assert_eq!(refused.unwrap_err(), PoolError::Shutdown);

    let future = executor.spawn(|| Ok(1));
    assert_eq!(future.wait(), Err(TaskError::Submit(PoolError::Shutdown)));
}

#[test]
fn test_call_after_shutdown_recreates_executor() {
    let handle = isolated(ExecutorKind::ThreadPool, 1);
    let wrapper = Pooled::new(handle.clone()).decorate(|x: i32| x + 1);
    let first = handle.current().unwrap();

    handle.shutdown();
    assert_eq!(wrapper.call(1).wait(), Ok(2));
    assert_ne!(handle.current().unwrap().id(), first.id());
    handle.shutdown();
}

#[test]
fn test_get_function_wrapper_with_prepared_fn() {
    let handle = isolated(ExecutorKind::ThreadPool, 1);
    let decorator = Pooled::new(handle.clone());
    let wrapper = decorator.get_function_wrapper(threaded::bridge::prepare(|s: &'static str| s.len()));

    assert_eq!(wrapper.call("four").wait(), Ok(4));
    handle.shutdown();
}

#[test]
fn test_into_fn_wrapper() {
    let handle = isolated(ExecutorKind::ThreadPool, 1);
    let call = Pooled::new(handle.clone()).decorate(|x: i32| x * x).into_fn();

    assert_eq!(call(9).wait(), Ok(81));
    handle.shutdown();
}

#[test]
fn test_blocking_pooled_flavour() {
    let decorator = BlockingPooled::new::<()>();
    assert_eq!(decorator.handle().kind(), ExecutorKind::BlockingPool);
    assert!(decorator.loop_getter().is_none());
    assert!(!decorator.loop_getter_need_context());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_await_future_without_loop() {
    let handle = isolated(ExecutorKind::ThreadPool, 2);
    let wrapper = Pooled::new(handle.clone()).decorate(|x: i32| x - 1);

    assert_eq!(wrapper.call(43).await, Ok(42));
    handle.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fixed_loop() {
    let handle = isolated(ExecutorKind::ThreadPool, 2);
    let wrapper = Pooled::new(handle.clone())
        .with_loop(Handle::current())
        .decorate(|_: ()| thread::current().id());

    let call = wrapper.call(());
    assert!(call.is_loop_task());
    assert_ne!(call.await.unwrap(), thread::current().id());
    handle.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_loop_getter_per_call() {
    let handle = isolated(ExecutorKind::ThreadPool, 2);
    let wrapper = Pooled::new(handle.clone())
        .with_loop_getter(|| Handle::try_current().ok())
        .decorate(|x: i32| x * 3);

    let call = wrapper.call(14);
    assert!(call.is_loop_task());
    assert_eq!(call.await, Ok(42));
    handle.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_context_loop_getter() {
    let handle = isolated(ExecutorKind::ThreadPool, 2);
    let runtime = Handle::current();
    let decorator = Pooled::new(handle.clone())
        .with_context_loop_getter(move |(use_loop, _): &(bool, i32)| use_loop.then(|| runtime.clone()));
    assert!(decorator.loop_getter_need_context());
    assert!(matches!(decorator.loop_getter(), LoopGetter::WithContext(_)));

    let wrapper = decorator.decorate(|(_, x): (bool, i32)| x + 1);

    let on_loop = wrapper.call((true, 1));
    let plain = wrapper.call((false, 2));
    assert!(on_loop.is_loop_task());
    assert!(!plain.is_loop_task());
    assert_eq!(on_loop.await, Ok(2));
    assert_eq!(plain.await, Ok(3));
    handle.shutdown();
}
