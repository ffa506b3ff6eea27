use std::collections::BTreeMap;
use std::str::FromStr;

use mac_address::MacAddress;
use napi_core::allocator::ClaimRequest;
use napi_core::pool_dispatcher::PoolHint;
use napi_core::{aggregations, network_pools, networks, nic_state_machine, nic_tags, pool_dispatcher, search};
use napi_model::{AggregationParams, LacpMode, NetworkParams, NicState};
use napi_store::Store;
use napi_types::{BelongsToId, OwnerId};
use sqlx::PgPool;

fn base_network(nic_tag: &str, name: &str, subnet: &str, start: &str, end: &str) -> NetworkParams {
    NetworkParams {
        uuid: None,
        name: name.to_string(),
        nic_tag: nic_tag.to_string(),
        vlan_id: 0,
        subnet: subnet.to_string(),
        provision_start_ip: start.to_string(),
        provision_end_ip: end.to_string(),
        gateway: None,
        resolvers: vec![],
        routes: BTreeMap::new(),
        mtu: 1500,
        owner_uuids: None,
        description: None,
        fabric: false,
        created_at: None,
        modified_at: None,
    }
}

/// A /29 has 8 addresses; the provision range below excludes the network and
/// broadcast addresses (`.0`/`.7`), leaving six claimable slots.
#[sqlx::test(migrator = "napi_store::migrations::MIGRATOR")]
async fn fills_subnet_then_reports_subnet_full(pool: PgPool) {
    let store = Store::new(pool);
    nic_tags::create_nic_tag(&store, napi_model::NicTagParams {
        uuid: None,
        name: "admin".to_string(),
        mtu: None,
    })
    .await
    .unwrap();
    let network = networks::create_network(&store, base_network("admin", "net-a", "10.0.0.0/29", "10.0.0.1", "10.0.0.6"))
        .await
        .unwrap();

    let admin = OwnerId::new();
    for i in 0..6 {
        let request = ClaimRequest {
            belongs_to_type: "server".to_string(),
            belongs_to_uuid: BelongsToId::new(),
            owner_uuid: admin,
            reserved: false,
        };
        let record = napi_core::allocator::allocate(&store, &network, None, request).await.unwrap();
        assert!(!record.free());
        let _ = i;
    }

    let request = ClaimRequest {
        belongs_to_type: "server".to_string(),
        belongs_to_uuid: BelongsToId::new(),
        owner_uuid: admin,
        reserved: false,
    };
    let err = napi_core::allocator::allocate(&store, &network, None, request).await.unwrap_err();
    assert!(matches!(err, napi_core::NapiError::SubnetFull { .. }));
}

#[sqlx::test(migrator = "napi_store::migrations::MIGRATOR")]
async fn reserve_then_unassign_keeps_ownership(pool: PgPool) {
    let store = Store::new(pool);
    nic_tags::create_nic_tag(&store, napi_model::NicTagParams {
        uuid: None,
        name: "admin".to_string(),
        mtu: None,
    })
    .await
    .unwrap();
    let network = networks::create_network(&store, base_network("admin", "net-b", "10.1.0.0/29", "10.1.0.1", "10.1.0.6"))
        .await
        .unwrap();
    let owner = OwnerId::new();
    let ip = "10.1.0.2".parse().unwrap();

    let reserved = napi_core::allocator::reserve(&store, &network, ip, Some(owner)).await.unwrap();
    assert!(reserved.reserved);
    assert!(reserved.free());

    let claim = ClaimRequest {
        belongs_to_type: "server".to_string(),
        belongs_to_uuid: BelongsToId::new(),
        owner_uuid: owner,
        reserved: true,
    };
    let claimed = napi_core::allocator::allocate(&store, &network, Some(ip), claim).await.unwrap();
    assert!(!claimed.free());

    let unassigned = napi_core::allocator::unassign(&store, &network, ip).await.unwrap();
    assert!(unassigned.free());
    assert_eq!(unassigned.owner_uuid, Some(owner));
    assert!(unassigned.reserved);
}

#[sqlx::test(migrator = "napi_store::migrations::MIGRATOR")]
async fn pool_dispatch_spills_to_second_network(pool: PgPool) {
    let store = Store::new(pool);
    nic_tags::create_nic_tag(&store, napi_model::NicTagParams {
        uuid: None,
        name: "admin".to_string(),
        mtu: None,
    })
    .await
    .unwrap();
    let net_a = networks::create_network(&store, base_network("admin", "pool-a", "10.2.0.0/30", "10.2.0.1", "10.2.0.1"))
        .await
        .unwrap();
    let net_b = networks::create_network(&store, base_network("admin", "pool-b", "10.3.0.0/29", "10.3.0.1", "10.3.0.6"))
        .await
        .unwrap();

    let admin = OwnerId::new();
    let pool_req = network_pools::PoolRequest {
        name: "dual".to_string(),
        description: None,
        network_uuids: vec![net_a.uuid, net_b.uuid],
        owner_uuids: None,
    };
    let network_pool = network_pools::create_pool(&store, pool_req, admin).await.unwrap();

    // Exhaust net_a's single slot (the /30 provision range has one address),
    // then confirm dispatch moves on to net_b instead of failing.
    let claim = ClaimRequest {
        belongs_to_type: "server".to_string(),
        belongs_to_uuid: BelongsToId::new(),
        owner_uuid: admin,
        reserved: false,
    };
    napi_core::allocator::allocate(&store, &net_a, None, claim).await.unwrap();

    let hint = PoolHint::default();
    let claim = ClaimRequest {
        belongs_to_type: "server".to_string(),
        belongs_to_uuid: BelongsToId::new(),
        owner_uuid: admin,
        reserved: false,
    };
    let (network, record) = pool_dispatcher::provision(&store, &network_pool, &hint, claim, admin, admin, true)
        .await
        .unwrap();
    assert_eq!(network.uuid, net_b.uuid);
    assert!(!record.free());
}

#[sqlx::test(migrator = "napi_store::migrations::MIGRATOR")]
async fn owner_predicate_rejects_ineligible_caller(pool: PgPool) {
    let store = Store::new(pool);
    nic_tags::create_nic_tag(&store, napi_model::NicTagParams {
        uuid: None,
        name: "admin".to_string(),
        mtu: None,
    })
    .await
    .unwrap();
    let admin = OwnerId::new();
    let eligible_owner = OwnerId::new();
    let mut params = base_network("admin", "restricted", "10.4.0.0/29", "10.4.0.1", "10.4.0.6");
    params.owner_uuids = Some(vec![eligible_owner]);
    let network = networks::create_network(&store, params).await.unwrap();

    let caller = OwnerId::new();
    let req = nic_state_machine::CreateNicRequest {
        mac: MacAddress::from_str("00:11:22:33:44:55").unwrap(),
        owner_uuid: caller,
        belongs_to_type: "server".to_string(),
        belongs_to_uuid: BelongsToId::new(),
        primary: true,
        state: NicState::Provisioning,
        network_uuid: Some(network.uuid),
        requested_ip: None,
        vlan_id: None,
        mtu: None,
        cn_uuid: None,
    };

    let err = nic_state_machine::create_nic(&store, req, caller, admin, true).await.unwrap_err();
    assert!(matches!(err, napi_core::NapiError::NotAuthorized { .. }));
}

#[sqlx::test(migrator = "napi_store::migrations::MIGRATOR")]
async fn search_finds_the_allocated_address(pool: PgPool) {
    let store = Store::new(pool);
    nic_tags::create_nic_tag(&store, napi_model::NicTagParams {
        uuid: None,
        name: "admin".to_string(),
        mtu: None,
    })
    .await
    .unwrap();
    let network = networks::create_network(&store, base_network("admin", "searchable", "10.5.0.0/29", "10.5.0.1", "10.5.0.6"))
        .await
        .unwrap();

    let owner = OwnerId::new();
    let ip = "10.5.0.3".parse().unwrap();
    let claim = ClaimRequest {
        belongs_to_type: "server".to_string(),
        belongs_to_uuid: BelongsToId::new(),
        owner_uuid: owner,
        reserved: false,
    };
    napi_core::allocator::allocate(&store, &network, Some(ip), claim).await.unwrap();

    let hits = search::search_ips(&store, ip).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].network_uuid, network.uuid);
    assert!(!hits[0].record.free());

    let fetched = search::get_ip(&store, &network, ip).await.unwrap();
    assert!(!fetched.free());

    let missing_ip = "10.5.0.4".parse().unwrap();
    let placeholder = search::get_ip(&store, &network, missing_ip).await.unwrap();
    assert!(placeholder.free());
}

#[sqlx::test(migrator = "napi_store::migrations::MIGRATOR")]
async fn aggregation_requires_existing_macs_on_server(pool: PgPool) {
    let store = Store::new(pool);
    let belongs_to_uuid = BelongsToId::new();
    let params = AggregationParams {
        belongs_to_uuid,
        name: "aggr0".to_string(),
        macs: vec![
            MacAddress::from_str("aa:bb:cc:dd:ee:01").unwrap(),
            MacAddress::from_str("aa:bb:cc:dd:ee:02").unwrap(),
        ],
        lacp_mode: LacpMode::Active,
        nic_tags_provided: None,
    };

    let err = aggregations::create_aggregation(&store, params).await.unwrap_err();
    assert!(matches!(err, napi_core::NapiError::InvalidParams(_)));
}
