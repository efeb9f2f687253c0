//! Postgres directory repository tests.

use biblio_core::{
    Organization, OrganizationKind, OrganizationService, PersonService, Role, UserService,
};
use biblio_db::test_fixtures::{person, test_database_url, user};
use biblio_db::{hash_api_key, Database};

async fn setup() -> Database {
    dotenvy::dotenv().ok();
    Database::connect(&test_database_url())
        .await
        .expect("Failed to connect to test database")
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_user_by_api_key() {
    let db = setup().await;
    let p = person("p-dir-user", "Grace", "Hopper");
    db.people.upsert(&p).await.unwrap();
    let u = user("dir-user", Role::Curator);
    db.users.upsert(&u, Some("dir-user-key")).await.unwrap();

    let found = db
        .users
        .get_user_by_api_key_hash(&hash_api_key("dir-user-key"))
        .await
        .unwrap()
        .expect("user by key");
    assert_eq!(found.id, "dir-user");
    assert_eq!(found.role, Role::Curator);

    let hits = db.people.suggest_people("hopp", 10).await.unwrap();
    assert!(hits.iter().any(|p| p.id == "p-dir-user"));
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_organization_tree() {
    let db = setup().await;
    for (id, parent, kind) in [
        ("dir-ugent", None, OrganizationKind::University),
        ("dir-fac", Some("dir-ugent"), OrganizationKind::Faculty),
        ("dir-dep", Some("dir-fac"), OrganizationKind::Department),
    ] {
        db.organizations
            .upsert(&Organization {
                id: id.into(),
                name: id.into(),
                parent_id: parent.map(String::from),
                kind,
            })
            .await
            .unwrap();
    }

    let chain = db.organizations.organization_tree("dir-dep").await.unwrap();
    let ids: Vec<&str> = chain.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["dir-dep", "dir-fac", "dir-ugent"]);
}
