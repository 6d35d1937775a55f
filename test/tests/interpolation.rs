use peerhost_session::transport::LocalNetwork;
use peerhost_shared::{DataPool, Interpolated, SyncEntity, INTERPOLATION_BUFFER_CAPACITY};
use peerhost_test::{protocol, run_rounds, settle, Motion, SmoothMotion, TestPeer};

fn set_ball(peer: &mut TestPeer, key: peerhost_shared::EntityKey, x: f32) {
    peer.entities
        .get_mut::<Interpolated<SmoothMotion>>(key)
        .unwrap()
        .behavior_mut()
        .x = x;
}

#[test]
fn remote_ball_moves_smoothly_to_target() {
    let _ = env_logger::builder().is_test(true).try_init();
    let network = LocalNetwork::new();
    let mut host = TestPeer::host(&network);
    let mut client = TestPeer::client(&network, host.port());
    let ball = host.spawn_ball(0.0);
    settle(&mut [&mut host, &mut client]);

    let id = host.id_of(ball).unwrap();
    assert_eq!(client.ball(id).unwrap().x, 0.0);

    set_ball(&mut host, ball, 10.0);
    let mut seen = Vec::new();
    for _ in 0..60 {
        run_rounds(&mut [&mut host, &mut client], 1);
        seen.push(client.ball(id).unwrap().x);
    }

    // never jumps past the target and never moves backwards
    assert!(seen.iter().all(|x| *x <= 10.0 + 1e-4));
    assert!(seen.windows(2).all(|pair| pair[1] >= pair[0] - 1e-4));
    // some frames land strictly between the old and new positions
    assert!(seen.iter().any(|x| *x > 0.0 && *x < 10.0));
    assert!((seen[seen.len() - 1] - 10.0).abs() < 1e-4);
    assert!(client.ball(id).unwrap().targets_started > 0);
}

#[test]
fn remote_ball_buffer_stays_bounded() {
    let network = LocalNetwork::new();
    let mut host = TestPeer::host(&network);
    let mut client = TestPeer::client(&network, host.port());
    let ball = host.spawn_ball(0.0);
    settle(&mut [&mut host, &mut client]);

    for step in 0..20 {
        set_ball(&mut host, ball, step as f32);
        run_rounds(&mut [&mut host, &mut client], 1);
        let key = client.key_of(host.id_of(ball).unwrap()).unwrap();
        let remote = client
            .entities
            .get::<Interpolated<SmoothMotion>>(key)
            .unwrap();
        assert!(remote.buffer().len() <= INTERPOLATION_BUFFER_CAPACITY + 1);
        assert!(remote.buffer().fraction() <= 1.0);
    }
}

#[test]
fn owner_ignores_echoed_snapshots() {
    let network = LocalNetwork::new();
    let mut host = TestPeer::host(&network);
    let mut client = TestPeer::client(&network, host.port());
    let ball = client.spawn_ball(3.0);
    settle(&mut [&mut host, &mut client]);
    let id = client.id_of(ball).unwrap();
    assert!((host.ball(id).unwrap().x - 3.0).abs() < 1e-4);

    set_ball(&mut client, ball, 7.0);
    run_rounds(&mut [&mut host, &mut client], 60);

    let owned = client
        .entities
        .get::<Interpolated<SmoothMotion>>(ball)
        .unwrap();
    assert_eq!(owned.behavior().x, 7.0);
    assert!(owned.buffer().is_empty());
    assert!((host.ball(id).unwrap().x - 7.0).abs() < 1e-4);
}

fn snapshot(pool: &mut DataPool, x: f32) -> Box<Motion> {
    let mut data = pool.take::<Motion>();
    data.x = x;
    data
}

#[test]
fn remote_copy_holds_last_target_until_more_data_arrives() {
    let protocol = protocol();
    let mut pool = DataPool::new();
    let mut ball = Interpolated::new(
        SmoothMotion::default(),
        &protocol.data_kinds,
        protocol.fixed_updates_between_ticks,
    )
    .unwrap();

    ball.on_received_data(false, snapshot(&mut pool, 0.0), &mut pool);
    ball.on_received_data(false, snapshot(&mut pool, 10.0), &mut pool);

    let mut seen = Vec::new();
    for _ in 0..20 {
        ball.fixed_update(false, &mut pool);
        assert!(ball.buffer().fraction() <= 1.0);
        seen.push(ball.behavior().x);
    }

    assert!(seen.iter().all(|x| *x >= 0.0 && *x <= 10.0));
    assert!(seen.windows(2).all(|pair| pair[1] >= pair[0]));
    // well past the send cadence the value rests on the last target
    assert!(seen[10..].iter().all(|x| *x == 10.0));
    assert_eq!(ball.buffer().len(), 1);

    ball.on_received_data(false, snapshot(&mut pool, 20.0), &mut pool);
    for _ in 0..3 {
        ball.fixed_update(false, &mut pool);
    }
    let x = ball.behavior().x;
    assert!(x > 10.0 && x < 20.0);
}
