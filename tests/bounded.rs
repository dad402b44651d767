mod common;
use common::*;

use strand::error::{CapacityError, ClosedError};
use strand::{bounded, BoundedChannel, Channel};

use futures_util::future::poll_immediate;
use futures_util::StreamExt;
use tokio::task::{spawn_local, yield_now};
use tokio::time::timeout;

#[tokio::test]
async fn closed_channel_rejects_recv_and_send() {
  let chan = bounded::<i32>(1);
  chan.close();

  assert!(chan.is_closed());
  assert_eq!(chan.recv().await, Err(ClosedError));
  assert_eq!(chan.send(42).await, Err(ClosedError));
}

#[tokio::test]
async fn recv_is_immediate_when_data_is_buffered() {
  let chan = bounded::<i32>(2);
  chan.send(42).await.unwrap();
  chan.send(36).await.unwrap();

  // Both receives complete on their first poll, without an executor turn.
  let mut recv = chan.recv();
  assert_eq!(poll_immediate(&mut recv).await, Some(Ok(42)));
  let mut recv = chan.recv();
  assert_eq!(poll_immediate(&mut recv).await, Some(Ok(36)));
}

#[tokio::test]
async fn send_is_immediate_while_capacity_remains() {
  let chan = bounded::<i32>(1);
  let mut send = chan.send(42);
  assert_eq!(poll_immediate(&mut send).await, Some(Ok(())));
  assert_eq!(chan.len(), 1);
}

#[tokio::test]
async fn recv_parks_until_a_sender_arrives() {
  run_local(async {
    let chan = bounded::<i32>(0);
    let tx = chan.clone();

    let sender = spawn_local(async move { tx.send(42).await });

    let value = timeout(TEST_TIMEOUT, chan.recv())
      .await
      .expect("recv timed out")
      .unwrap();
    assert_eq!(value, 42);
    sender.await.unwrap().unwrap();
  })
  .await;
}

#[tokio::test]
async fn send_parks_until_a_receiver_arrives() {
  run_local(async {
    let chan = bounded::<i32>(0);
    let rx = chan.clone();

    let receiver = spawn_local(async move { rx.recv().await });

    timeout(TEST_TIMEOUT, chan.send(42))
      .await
      .expect("send timed out")
      .unwrap();
    assert_eq!(receiver.await.unwrap(), Ok(42));
  })
  .await;
}

#[tokio::test]
async fn close_rejects_a_parked_recv() {
  run_local(async {
    let chan = bounded::<i32>(0);
    let closer = chan.clone();

    spawn_local(async move {
      yield_now().await;
      closer.close();
    });

    assert_eq!(
      timeout(TEST_TIMEOUT, chan.recv()).await.expect("recv timed out"),
      Err(ClosedError)
    );
  })
  .await;
}

#[tokio::test]
async fn close_rejects_a_parked_send() {
  run_local(async {
    let chan = bounded::<i32>(0);
    let closer = chan.clone();

    spawn_local(async move {
      yield_now().await;
      closer.close();
    });

    assert_eq!(
      timeout(TEST_TIMEOUT, chan.send(42)).await.expect("send timed out"),
      Err(ClosedError)
    );
  })
  .await;
}

#[tokio::test]
async fn parked_receivers_are_served_in_arrival_order() {
  run_local(async {
    let chan = bounded::<&str>(0);

    let first = spawn_local({
      let chan = chan.clone();
      async move { chan.recv().await.unwrap() }
    });
    let second = spawn_local({
      let chan = chan.clone();
      async move { chan.recv().await.unwrap() }
    });
    yield_now().await;
    yield_now().await;

    chan.send("jonathan").await.unwrap();
    chan.send(" joestar").await.unwrap();

    let joined = format!("{}{}", first.await.unwrap(), second.await.unwrap());
    assert_eq!(joined, "jonathan joestar");
  })
  .await;
}

#[tokio::test]
async fn parked_senders_are_served_in_arrival_order() {
  run_local(async {
    let chan = bounded::<&str>(0);

    for word in ["jonathan", " joestar"] {
      spawn_local({
        let chan = chan.clone();
        async move { chan.send(word).await.unwrap() }
      });
    }
    yield_now().await;
    yield_now().await;
    assert_eq!(chan.len(), 2);

    let mut joined = String::new();
    joined.push_str(chan.recv().await.unwrap());
    joined.push_str(chan.recv().await.unwrap());
    assert_eq!(joined, "jonathan joestar");
  })
  .await;
}

#[tokio::test]
async fn ping_pong_rendezvous() {
  let chan = bounded::<i32>(0);

  // Sender first: it parks, the receive unblocks it.
  let (sent, received) = tokio::join!(chan.send(42), chan.recv());
  assert_eq!(sent, Ok(()));
  assert_eq!(received, Ok(42));

  // Receiver first: it parks, the send delivers directly.
  let (received, sent) = tokio::join!(chan.recv(), chan.send(36));
  assert_eq!(received, Ok(36));
  assert_eq!(sent, Ok(()));
}

#[tokio::test]
async fn buffered_length_never_exceeds_capacity() {
  let chan = bounded::<usize>(3);

  let mut sent: usize = 0;
  let mut received: usize = 0;
  for round in 1..4usize {
    for i in 0..round {
      chan.send(i).await.unwrap();
      sent += 1;
      assert!(chan.len() <= 3);
      assert_eq!(chan.len(), (sent - received) as isize);
    }
    while chan.len() > 0 {
      chan.recv().await.unwrap();
      received += 1;
    }
  }
  assert_eq!(sent, received);
  assert_eq!(chan.len(), 0);
}

#[tokio::test]
async fn length_is_negative_while_receivers_hang() {
  let chan = bounded::<i32>(0);

  let mut first = chan.recv();
  let mut second = chan.recv();
  assert!(poll_immediate(&mut first).await.is_none());
  assert_eq!(chan.len(), -1);
  assert!(poll_immediate(&mut second).await.is_none());
  assert_eq!(chan.len(), -2);

  chan.close();
  assert_eq!(poll_immediate(&mut first).await, Some(Err(ClosedError)));
  assert_eq!(poll_immediate(&mut second).await, Some(Err(ClosedError)));
}

#[tokio::test]
async fn length_counts_parked_senders() {
  let chan = bounded::<i32>(0);

  let mut first = chan.send(42);
  let mut second = chan.send(36);
  assert!(poll_immediate(&mut first).await.is_none());
  assert_eq!(chan.len(), 1);
  assert!(poll_immediate(&mut second).await.is_none());
  assert_eq!(chan.len(), 2);

  chan.close();
  assert_eq!(poll_immediate(&mut first).await, Some(Err(ClosedError)));
  assert_eq!(poll_immediate(&mut second).await, Some(Err(ClosedError)));
}

#[tokio::test]
async fn close_broadcasts_to_every_parked_recv() {
  run_local(async {
    let chan = bounded::<i32>(0);

    let handles: Vec<_> = (0..3)
      .map(|_| {
        spawn_local({
          let chan = chan.clone();
          async move { chan.recv().await }
        })
      })
      .collect();
    yield_now().await;
    yield_now().await;
    assert_eq!(chan.len(), -3);

    chan.close();
    for handle in handles {
      assert_eq!(handle.await.unwrap(), Err(ClosedError));
    }
    assert_eq!(chan.len(), 0);
  })
  .await;
}

#[tokio::test]
async fn close_discards_buffered_elements() {
  let chan: BoundedChannel<i32> = [1, 2].into_iter().collect();
  chan.close();

  assert_eq!(chan.len(), 0);
  assert_eq!(chan.recv().await, Err(ClosedError));
}

#[tokio::test]
async fn close_is_idempotent() {
  let chan = bounded::<i32>(1);
  chan.send(1).await.unwrap();

  chan.close();
  chan.close();

  assert!(chan.is_closed());
  assert_eq!(chan.recv().await, Err(ClosedError));
}

#[tokio::test]
async fn preloaded_defaults_capacity_to_sequence_length() {
  let chan: BoundedChannel<i32> = [42, 36].into_iter().collect();

  assert_eq!(chan.capacity(), Some(2));
  assert_eq!(chan.len(), 2);
  assert_eq!(chan.recv().await, Ok(42));
  assert_eq!(chan.recv().await, Ok(36));
}

#[tokio::test]
async fn preloaded_with_room_to_spare() {
  let chan = BoundedChannel::preloaded([42, 36], 5).unwrap();
  assert_eq!(chan.capacity(), Some(5));

  // Three more fit immediately; the fourth parks.
  for extra in [1, 2, 3] {
    let mut send = chan.send(extra);
    assert_eq!(poll_immediate(&mut send).await, Some(Ok(())));
  }
  let mut fourth = chan.send(4);
  assert!(poll_immediate(&mut fourth).await.is_none());
  assert_eq!(chan.len(), 6);

  // Seed order is preserved, and the first receive rotates the parked
  // sender's value into the freed slot.
  assert_eq!(chan.recv().await, Ok(42));
  assert_eq!(poll_immediate(&mut fourth).await, Some(Ok(())));
  assert_eq!(chan.recv().await, Ok(36));
  for expected in [1, 2, 3, 4] {
    assert_eq!(chan.recv().await, Ok(expected));
  }
}

#[tokio::test]
async fn preloading_past_the_capacity_fails_synchronously() {
  let err = BoundedChannel::preloaded([1, 2, 3], 2).unwrap_err();
  assert_eq!(
    err,
    CapacityError {
      capacity: 2,
      required: 3
    }
  );
}

#[tokio::test]
async fn dropped_recv_future_withdraws_its_registration() {
  let chan = bounded::<i32>(0);

  let mut recv = chan.recv();
  assert!(poll_immediate(&mut recv).await.is_none());
  assert_eq!(chan.len(), -1);

  drop(recv);
  assert_eq!(chan.len(), 0);

  // The canceled entry is skipped: a later send parks instead of delivering
  // into the abandoned operation.
  let mut send = chan.send(9);
  assert!(poll_immediate(&mut send).await.is_none());
  assert_eq!(chan.len(), 1);
}

#[tokio::test]
async fn dropped_send_future_withdraws_its_value() {
  let chan = bounded::<i32>(0);

  let mut send = chan.send(7);
  assert!(poll_immediate(&mut send).await.is_none());
  drop(send);
  assert_eq!(chan.len(), 0);

  // The abandoned value is gone; a receive parks.
  let mut recv = chan.recv();
  assert!(poll_immediate(&mut recv).await.is_none());
  assert_eq!(chan.len(), -1);
  chan.close();
}

#[tokio::test]
async fn stream_yields_rendezvous_values_in_order() {
  run_local(async {
    let chan = bounded::<&str>(0);

    for word in ["rick", "zeep", "kyle"] {
      spawn_local({
        let chan = chan.clone();
        async move { chan.send(word).await.unwrap() }
      });
    }

    let received: Vec<_> = chan.stream().take(3).collect().await;
    assert_eq!(received, ["rick", "zeep", "kyle"]);
  })
  .await;
}
