use super::*;
use crate::error::ErrorCode;

fn items(n: i64) -> Vec<Item> {
    (1..=n).map(|id| Item::new(id, format!("Anime {id}"), format!("{id}.jpg"))).collect()
}

fn template(title: &str, description: Option<&str>) -> NewTemplate {
    NewTemplate { title: title.into(), description: description.map(str::to_owned) }
}

fn author(full_name: Option<&str>) -> Author {
    Author { id: Uuid::new_v4(), full_name: full_name.map(str::to_owned), avatar_url: None }
}

// =============================================================================
// validate
// =============================================================================

#[test]
fn validate_accepts_well_formed_template() {
    assert!(validate(&template("Best of 2023", Some("My picks")), &items(3)).is_ok());
}

#[test]
fn validate_rejects_blank_title() {
    let err = validate(&template("   ", None), &items(1)).unwrap_err();
    assert!(matches!(err, TemplateError::EmptyTitle));
    assert_eq!(err.error_code(), "E_TEMPLATE_EMPTY_TITLE");
}

#[test]
fn validate_title_limit_counts_chars() {
    let fifty = "é".repeat(MAX_TITLE_CHARS);
    assert!(validate(&template(&fifty, None), &items(1)).is_ok());
    let fifty_one = "a".repeat(MAX_TITLE_CHARS + 1);
    assert!(matches!(validate(&template(&fifty_one, None), &items(1)), Err(TemplateError::TitleTooLong)));
}

#[test]
fn validate_rejects_long_description() {
    let long = "x".repeat(MAX_DESCRIPTION_CHARS + 1);
    assert!(matches!(
        validate(&template("Ok", Some(&long)), &items(1)),
        Err(TemplateError::DescriptionTooLong)
    ));
}

#[test]
fn validate_rejects_empty_items() {
    assert!(matches!(validate(&template("Ok", None), &[]), Err(TemplateError::EmptyItems)));
}

// =============================================================================
// author_display_name
// =============================================================================

#[test]
fn author_name_is_first_word() {
    assert_eq!(author_display_name(&author(Some("Satoshi Kon"))), "Satoshi");
    assert_eq!(author_display_name(&author(Some("  Hayao   Miyazaki "))), "Hayao");
}

#[test]
fn author_name_falls_back_to_anonymous() {
    assert_eq!(author_display_name(&author(None)), ANONYMOUS_AUTHOR);
    assert_eq!(author_display_name(&author(Some("   "))), ANONYMOUS_AUTHOR);
}

// =============================================================================
// escape_like
// =============================================================================

#[test]
fn escape_like_wraps_and_escapes_wildcards() {
    assert_eq!(escape_like("shonen"), "%shonen%");
    assert_eq!(escape_like("100%_real\\"), "%100\\%\\_real\\\\%");
}

#[test]
fn query_deserializes_author_alias() {
    let id = Uuid::new_v4();
    let query: TemplateQuery = serde_json::from_value(serde_json::json!({ "author": id, "search": "mecha" })).unwrap();
    assert_eq!(query.author_id, Some(id));
    assert_eq!(query.search.as_deref(), Some("mecha"));
}

// =============================================================================
// list_query
// =============================================================================

#[test]
fn community_listing_is_public_and_capped() {
    let builder = list_query(&TemplateQuery { search: Some("mecha".into()), author_id: None });
    let sql = builder.sql();
    assert!(sql.contains("WHERE is_public"));
    assert!(sql.contains("title ILIKE $1 OR author_name ILIKE $2"));
    assert!(sql.ends_with("LIMIT $3"));
}

#[test]
fn author_listing_includes_private_templates() {
    let builder = list_query(&TemplateQuery { search: None, author_id: Some(Uuid::new_v4()) });
    let sql = builder.sql();
    assert!(sql.contains("WHERE author_id = $1"));
    assert!(!sql.contains("is_public"));
    assert!(!sql.contains("LIMIT"));
}

#[test]
fn retryable_only_for_database_errors() {
    assert!(!TemplateError::EmptyItems.retryable());
    assert!(!TemplateError::NotFound(Uuid::nil()).retryable());
    assert!(TemplateError::Database(sqlx::Error::PoolTimedOut).retryable());
}

// =============================================================================
// Live database
// =============================================================================

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;

    async fn pool() -> Option<PgPool> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        crate::db::init_pool(&url, 2).await.ok()
    }

    #[tokio::test]
    async fn publish_then_get_preserves_item_order() {
        let Some(pool) = pool().await else { return };
        let who = author(Some("Mamoru Hosoda"));
        let record = publish(&pool, &who, &template("Summer Wars et al", None), items(4)).await.unwrap();
        assert_eq!(record.author_name, "Mamoru");

        let loaded = get(&pool, record.id).await.unwrap();
        let ids: Vec<i64> = loaded.items.iter().map(|i| i.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn list_by_author_returns_only_that_author() {
        let Some(pool) = pool().await else { return };
        let who = author(Some("Naoko Yamada"));
        publish(&pool, &who, &template("Kyoto picks", None), items(1)).await.unwrap();
        publish(&pool, &author(None), &template("Other picks", None), items(1)).await.unwrap();

        let found = list(&pool, &TemplateQuery { search: None, author_id: Some(who.id) }).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Kyoto picks");
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let Some(pool) = pool().await else { return };
        assert!(matches!(get(&pool, Uuid::new_v4()).await, Err(TemplateError::NotFound(_))));
    }
}
