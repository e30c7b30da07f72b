/// Deep links into a single task
///
/// A link looks like `https://host/app?taskId=task-…`. On start the task id
/// is taken from the address and held until someone is signed in; after one
/// resolution attempt the parameter is removed from the visible address,
/// keeping every other query parameter.

use url::Url;

/// Query parameter carrying the task id
pub const TASK_ID_PARAM: &str = "taskId";

/// Task id referenced by `location`, if any
///
/// An empty value counts as absent.
pub fn task_id_from(location: &Url) -> Option<String> {
    location
        .query_pairs()
        .find(|(key, _)| key == TASK_ID_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// `location` without the task id parameter
///
/// Drops the `?` entirely when nothing else remains.
pub fn strip_task_id(location: &Url) -> Url {
    let kept: Vec<(String, String)> = location
        .query_pairs()
        .filter(|(key, _)| key != TASK_ID_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut stripped = location.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}
