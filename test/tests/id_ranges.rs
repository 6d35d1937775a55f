use peerhost_session::transport::LocalNetwork;
use peerhost_shared::IdRange;
use peerhost_test::{settle, TestPeer};

fn range_of(host: &TestPeer, client_id: u16) -> Option<IdRange> {
    host.session
        .connections()
        .find(|connection| connection.id == client_id)
        .map(|connection| connection.id_range)
}

#[test]
fn every_connection_gets_its_own_range() {
    let _ = env_logger::builder().is_test(true).try_init();
    let network = LocalNetwork::new();
    let mut host = TestPeer::host(&network);
    let mut first = TestPeer::client(&network, host.port());
    let mut second = TestPeer::client(&network, host.port());
    let first_player = first.spawn_player(0.0, 0.0);
    let second_player = second.spawn_player(0.0, 0.0);

    settle(&mut [&mut host, &mut first, &mut second]);

    assert_eq!(range_of(&host, 1), Some(IdRange::new(0, 499)));
    assert_eq!(range_of(&host, 2), Some(IdRange::new(500, 999)));
    assert_eq!(range_of(&host, 3), Some(IdRange::new(1000, 1499)));
    assert_eq!(first.id_of(first_player), Some(500));
    assert_eq!(second.id_of(second_player), Some(1000));
}

#[test]
fn freed_range_goes_to_next_client() {
    let network = LocalNetwork::new();
    let mut host = TestPeer::host(&network);
    let mut first = TestPeer::client(&network, host.port());
    let mut second = TestPeer::client(&network, host.port());
    settle(&mut [&mut host, &mut first, &mut second]);

    second.stop();
    settle(&mut [&mut host, &mut first]);
    assert_eq!(range_of(&host, 3), None);

    let mut third = TestPeer::client(&network, host.port());
    let player = third.spawn_player(0.0, 0.0);
    settle(&mut [&mut host, &mut first, &mut third]);

    assert_eq!(range_of(&host, 4), Some(IdRange::new(1000, 1499)));
    assert_eq!(third.id_of(player), Some(1000));
}

#[test]
fn destroyed_ids_are_reused() {
    let network = LocalNetwork::new();
    let mut host = TestPeer::host(&network);
    let first = host.spawn_player(0.0, 0.0);
    settle(&mut [&mut host]);
    assert_eq!(host.id_of(first), Some(0));

    host.destroy(first);
    settle(&mut [&mut host]);
    let second = host.spawn_player(0.0, 0.0);
    settle(&mut [&mut host]);

    assert_eq!(host.id_of(second), Some(0));
}

#[test]
fn client_joining_as_another_leaves_gets_no_stale_entities() {
    let _ = env_logger::builder().is_test(true).try_init();
    let network = LocalNetwork::new();
    let mut host = TestPeer::host(&network);
    let mut leaving = TestPeer::client(&network, host.port());
    let leaving_player = leaving.spawn_player(1.0, 1.0);
    settle(&mut [&mut host, &mut leaving]);
    assert_eq!(leaving.id_of(leaving_player), Some(500));
    assert_eq!(host.player_count(), 1);

    // the host sees the leave and the join in the same fixed update
    leaving.stop();
    let mut joining = TestPeer::client(&network, host.port());
    settle(&mut [&mut host, &mut joining]);

    assert_eq!(host.player_count(), 0);
    assert_eq!(host.key_of(500), None);
    assert_eq!(range_of(&host, 3), Some(IdRange::new(500, 999)));
    assert_eq!(joining.player_count(), 0);
    assert_eq!(joining.key_of(500), None);

    let joining_player = joining.spawn_player(2.0, 2.0);
    settle(&mut [&mut host, &mut joining]);

    assert_eq!(joining.id_of(joining_player), Some(500));
    assert_eq!(joining.player_count(), 1);
    assert_eq!(host.player_count(), 1);
    assert_eq!(host.player(500).map(|player| player.x), Some(2.0));
}
