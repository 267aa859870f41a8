//! End-to-end virtual-time scenarios, one per operator, each subscribing at the default
//! `SUBSCRIBED_TIME` (200) and asserting both the recorded output trace and the recorded
//! subscription window(s) of every scripted source.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;

use rx_common::RxError;
use rx_operators::{combine_latest, filter, retry, switch_on_next, zip};
use rx_testing::{make_hot_observable, Record, SubscriptionRecord, VirtualTimeScheduler};

fn is_prime(n: i32) -> bool {
    if n < 2 {
        return false;
    }
    let mut i = 2;
    while i * i <= n {
        if n % i == 0 {
            return false;
        }
        i += 1;
    }
    true
}

#[test]
fn s1_filter_runs_to_completion() {
    let scheduler = VirtualTimeScheduler::new();
    let xs = make_hot_observable(
        &scheduler,
        vec![
            Record::on_next(230, 3),
            Record::on_next(270, 4),
            Record::on_next(340, 5),
            Record::on_next(380, 6),
            Record::on_next(390, 7),
            Record::on_next(450, 8),
            Record::on_next(470, 9),
            Record::on_next(560, 10),
            Record::on_next(580, 11),
            Record::on_completed(600),
        ],
    );

    let invocations = Arc::new(AtomicUsize::new(0));
    let invocations_for_factory = invocations.clone();

    let source = xs.as_observable(&scheduler);
    let observer = scheduler.start(move || {
        filter(&source, move |v: &i32| {
            invocations_for_factory.fetch_add(1, Ordering::SeqCst);
            is_prime(*v)
        })
    });

    assert_eq!(
        observer.messages(),
        vec![
            Record::on_next(230, 3),
            Record::on_next(340, 5),
            Record::on_next(390, 7),
            Record::on_next(580, 11),
            Record::on_completed(600),
        ]
    );
    assert_eq!(xs.subscriptions(), vec![SubscriptionRecord::new(200, 600)]);
    assert_eq!(invocations.load(Ordering::SeqCst), 9);
}

#[test]
fn s2_filter_disposed_before_completion() {
    let scheduler = VirtualTimeScheduler::new();
    let xs = make_hot_observable(
        &scheduler,
        vec![
            Record::on_next(230, 3),
            Record::on_next(270, 4),
            Record::on_next(340, 5),
            Record::on_next(380, 6),
            Record::on_next(390, 7),
            Record::on_next(450, 8),
            Record::on_next(470, 9),
            Record::on_next(560, 10),
            Record::on_next(580, 11),
            Record::on_completed(600),
        ],
    );

    let invocations = Arc::new(AtomicUsize::new(0));
    let invocations_for_factory = invocations.clone();
    let source = xs.as_observable(&scheduler);
    let observer = scheduler.start_at(
        move || {
            filter(&source, move |v: &i32| {
                invocations_for_factory.fetch_add(1, Ordering::SeqCst);
                is_prime(*v)
            })
        },
        None,
        Some(400),
    );

    assert_eq!(
        observer.messages(),
        vec![Record::on_next(230, 3), Record::on_next(340, 5), Record::on_next(390, 7)]
    );
    assert_eq!(xs.subscriptions(), vec![SubscriptionRecord::new(200, 400)]);
    assert_eq!(invocations.load(Ordering::SeqCst), 5);
}

#[test]
fn s3_combine_latest_return_return() {
    let scheduler = VirtualTimeScheduler::new();
    let a = make_hot_observable(&scheduler, vec![Record::on_next(215, 2), Record::on_completed(230)]);
    let b = make_hot_observable(&scheduler, vec![Record::on_next(220, 3), Record::on_completed(240)]);

    let a_obs = a.as_observable(&scheduler);
    let b_obs = b.as_observable(&scheduler);
    let observer =
        scheduler.start(move || combine_latest(vec![a_obs, b_obs], |v: Vec<i32>| v[0] + v[1]));

    assert_eq!(observer.messages(), vec![Record::on_next(220, 5), Record::on_completed(240)]);
    assert_eq!(a.subscriptions(), vec![SubscriptionRecord::new(200, 230)]);
    assert_eq!(b.subscriptions(), vec![SubscriptionRecord::new(200, 240)]);
}

#[test]
fn s4_zip_ends_with_error_on_the_right() {
    let scheduler = VirtualTimeScheduler::new();
    let a = make_hot_observable(
        &scheduler,
        vec![Record::on_next(215, 2), Record::on_next(225, 4), Record::on_completed(250)],
    );
    let b = make_hot_observable(
        &scheduler,
        vec![
            Record::on_next(235, 6),
            Record::on_next(240, 7),
            Record::on_error(245, RxError::callback("right source failed")),
        ],
    );

    let a_obs = a.as_observable(&scheduler);
    let b_obs = b.as_observable(&scheduler);
    let observer = scheduler.start(move || zip(vec![a_obs, b_obs], |v: Vec<i32>| v[0] + v[1]));

    let messages = observer.messages();
    assert_eq!(messages.len(), 3);
    assert!(messages[0].matches_kind(&Record::on_next(235, 8)));
    assert!(messages[1].matches_kind(&Record::on_next(240, 11)));
    assert!(messages[2].matches_kind(&Record::on_error(245, RxError::callback("right source failed"))));
    assert_eq!(a.subscriptions(), vec![SubscriptionRecord::new(200, 245)]);
    assert_eq!(b.subscriptions(), vec![SubscriptionRecord::new(200, 245)]);
}

#[test]
fn s5_switch_on_next_follows_the_latest_inner() {
    let scheduler = VirtualTimeScheduler::new();

    let inner1 = make_hot_observable(
        &scheduler,
        vec![
            Record::on_next(310, 101),
            Record::on_next(320, 102),
            Record::on_next(410, 103),
            Record::on_next(420, 104),
            Record::on_next(510, 105),
            Record::on_next(520, 106),
            Record::on_completed(530),
        ],
    );
    let inner2 = make_hot_observable(
        &scheduler,
        vec![
            Record::on_next(410, 201),
            Record::on_next(420, 202),
            Record::on_next(430, 203),
            Record::on_next(440, 204),
            Record::on_completed(450),
        ],
    );
    let inner3 = make_hot_observable(
        &scheduler,
        vec![
            Record::on_next(510, 301),
            Record::on_next(520, 302),
            Record::on_next(530, 303),
            Record::on_next(540, 304),
            Record::on_completed(650),
        ],
    );

    let inner1_obs = inner1.as_observable(&scheduler);
    let inner2_obs = inner2.as_observable(&scheduler);
    let inner3_obs = inner3.as_observable(&scheduler);

    let outer = make_hot_observable(
        &scheduler,
        vec![
            Record::on_next(300, inner1_obs),
            Record::on_next(400, inner2_obs),
            Record::on_next(500, inner3_obs),
            Record::on_completed(600),
        ],
    );
    let outer_obs = outer.as_observable(&scheduler);

    let observer = scheduler.start(move || switch_on_next(&outer_obs));

    assert_eq!(
        observer.messages(),
        vec![
            Record::on_next(310, 101),
            Record::on_next(320, 102),
            Record::on_next(410, 201),
            Record::on_next(420, 202),
            Record::on_next(430, 203),
            Record::on_next(440, 204),
            Record::on_next(510, 301),
            Record::on_next(520, 302),
            Record::on_next(530, 303),
            Record::on_next(540, 304),
            Record::on_completed(650),
        ]
    );
    assert_eq!(inner1.subscriptions(), vec![SubscriptionRecord::new(300, 400)]);
    assert_eq!(inner2.subscriptions(), vec![SubscriptionRecord::new(400, 500)]);
    assert_eq!(inner3.subscriptions(), vec![SubscriptionRecord::new(500, 650)]);
}

#[test]
fn s6_retry_gives_up_after_the_limit() {
    let scheduler = VirtualTimeScheduler::new();
    let xs = make_hot_observable(
        &scheduler,
        vec![
            Record::on_next(300, 1),
            Record::on_next(325, 2),
            Record::on_next(350, 3),
            Record::on_error(400, RxError::callback("retry on_error from source")),
            Record::on_next(425, 1),
            Record::on_next(450, 2),
            Record::on_next(475, 3),
            Record::on_next(500, 4),
            Record::on_error(525, RxError::callback("retry on_error from source")),
            Record::on_next(550, 1),
            Record::on_completed(725),
        ],
    );

    let source = xs.as_observable(&scheduler);
    let observer = scheduler.start(move || retry(&source, Some(2)));

    assert_eq!(
        observer.messages(),
        vec![
            Record::on_next(300, 1),
            Record::on_next(325, 2),
            Record::on_next(350, 3),
            Record::on_next(425, 1),
            Record::on_next(450, 2),
            Record::on_next(475, 3),
            Record::on_next(500, 4),
            Record::on_error(525, RxError::callback("retry on_error from source")),
        ]
    );
    assert_eq!(
        xs.subscriptions(),
        vec![SubscriptionRecord::new(200, 400), SubscriptionRecord::new(400, 525)]
    );
}
