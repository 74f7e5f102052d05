use std::time::Duration;

use crate::error::CacheError;
use crate::store::Cache;

/// Run the full cache conformance test suite against any [`Cache`]
/// implementation.
///
/// Call this from a backend's own test module with a fresh cache instance,
/// the same way `acteon-state`'s `run_store_conformance_tests` is reused
/// across every `StateStore` backend.
///
/// # Errors
///
/// Returns an error if any conformance assertion fails.
pub async fn run_cache_conformance_tests(cache: &dyn Cache) -> Result<(), CacheError> {
    test_get_missing(cache).await?;
    test_set_and_get(cache).await?;
    test_add_if_absent_new(cache).await?;
    test_add_if_absent_existing(cache).await?;
    test_remove(cache).await?;
    test_increment(cache).await?;
    test_replace_if_equal(cache).await?;
    test_remove_if_equal(cache).await?;
    test_exists(cache).await?;
    Ok(())
}

async fn test_get_missing(cache: &dyn Cache) -> Result<(), CacheError> {
    let val = cache.get("conformance:missing").await?;
    assert!(val.is_none(), "get on missing key should return None");
    Ok(())
}

async fn test_set_and_get(cache: &dyn Cache) -> Result<(), CacheError> {
    cache.set("conformance:set-get", "hello", None).await?;
    let val = cache.get("conformance:set-get").await?;
    assert_eq!(val.as_deref(), Some("hello"));
    Ok(())
}

async fn test_add_if_absent_new(cache: &dyn Cache) -> Result<(), CacheError> {
    let created = cache
        .add_if_absent("conformance:aia-new", "v1", None)
        .await?;
    assert!(created, "add_if_absent on new key should return true");
    Ok(())
}

async fn test_add_if_absent_existing(cache: &dyn Cache) -> Result<(), CacheError> {
    cache.set("conformance:aia-existing", "v1", None).await?;
    let created = cache
        .add_if_absent("conformance:aia-existing", "v2", None)
        .await?;
    assert!(!created, "add_if_absent on existing key should return false");
    let val = cache.get("conformance:aia-existing").await?;
    assert_eq!(val.as_deref(), Some("v1"), "original value should remain");
    Ok(())
}

async fn test_remove(cache: &dyn Cache) -> Result<(), CacheError> {
    cache.set("conformance:to-delete", "bye", None).await?;
    assert!(cache.remove("conformance:to-delete").await?);
    assert!(cache.get("conformance:to-delete").await?.is_none());
    assert!(!cache.remove("conformance:to-delete").await?);
    Ok(())
}

async fn test_increment(cache: &dyn Cache) -> Result<(), CacheError> {
    let v = cache.increment("conformance:counter", 1, None).await?;
    assert_eq!(v, 1);
    let v = cache.increment("conformance:counter", 5, None).await?;
    assert_eq!(v, 6);
    let v = cache.increment("conformance:counter", -2, None).await?;
    assert_eq!(v, 4);
    Ok(())
}

async fn test_replace_if_equal(cache: &dyn Cache) -> Result<(), CacheError> {
    cache.set("conformance:cas", "v1", None).await?;
    assert!(!cache.replace_if_equal("conformance:cas", "wrong", "v2", None).await?);
    assert!(cache.replace_if_equal("conformance:cas", "v1", "v2", None).await?);
    assert_eq!(cache.get("conformance:cas").await?.as_deref(), Some("v2"));
    Ok(())
}

async fn test_remove_if_equal(cache: &dyn Cache) -> Result<(), CacheError> {
    cache.set("conformance:rie", "owner-a", None).await?;
    assert!(!cache.remove_if_equal("conformance:rie", "owner-b").await?);
    assert!(cache.remove_if_equal("conformance:rie", "owner-a").await?);
    Ok(())
}

async fn test_exists(cache: &dyn Cache) -> Result<(), CacheError> {
    assert!(!cache.exists("conformance:exists").await?);
    cache
        .set("conformance:exists", "x", Some(Duration::from_secs(60)))
        .await?;
    assert!(cache.exists("conformance:exists").await?);
    Ok(())
}
