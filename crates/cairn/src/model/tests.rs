#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use rand::{rngs::StdRng, Rng as _, SeedableRng as _};
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};
    use tempfile::{tempdir, TempDir};

    use crate::{
        CairnError,
        FieldRule,
        FieldType,
        FieldValue,
        Filter,
        Model,
        ObjectId,
        Schema,
        Store,
        ViolationKind,
    };

    fn user_schema() -> Schema {
        Schema::new()
            .field("username", FieldRule::string().required())
            .field("password", FieldRule::string())
            .field("age", FieldRule::number())
            .field("active", FieldRule::boolean().default_value(true))
    }

    fn task_schema() -> Schema {
        Schema::new()
            .field("title", FieldRule::string().required())
            .field("user", FieldRule::reference("User"))
            .field("due", FieldRule::date())
    }

    async fn setup() -> (Store, Model, Model, TempDir) {
        let temp_dir = tempdir().unwrap();
        let store = Store::new();
        let users = store.model("User", user_schema()).await.unwrap();
        let tasks = store.model("Task", task_schema()).await.unwrap();
        store.connect(temp_dir.path()).await.unwrap();
        (store, users, tasks, temp_dir)
    }

    #[tokio::test]
    async fn test_create_then_find_by_id() {
        let (_store, users, _tasks, _temp_dir) = setup().await;

        let ana = users.create(json!({"username": "ana"})).await.unwrap();
        assert!(!ana.id().trim().is_empty());
        assert!(ana.is_persisted());

        let found = users.find_by_id(&ana.id()).await.unwrap().unwrap();
        assert_eq!(found.get_str("username"), Some("ana"));
        assert_eq!(found.get_bool("active"), Some(true));
        assert_eq!(found.object_id(), ana.object_id());
    }

    #[tokio::test]
    async fn test_find_by_unknown_id_is_none() {
        let (_store, users, _tasks, _temp_dir) = setup().await;
        assert!(users.find_by_id("missing").await.unwrap().is_none());

        users.create(json!({"username": "ana"})).await.unwrap();
        assert!(users.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_saved_document_reads_back_unchanged() {
        let (_store, users, _tasks, _temp_dir) = setup().await;

        let mut ana = users
            .new_instance(json!({"username": "ana", "password": "123", "age": 31, "nickname": "an"}))
            .unwrap();
        ana.save().await.unwrap();

        let found = users.find_by_id(&ana.id()).await.unwrap().unwrap();
        assert_eq!(found.to_json(), ana.to_json());
        assert_eq!(found.get_i64("age"), Some(31));
        assert_eq!(found.get_str("nickname"), Some("an"));
    }

    #[tokio::test]
    async fn test_save_twice_upserts() {
        let (_store, users, _tasks, temp_dir) = setup().await;

        let mut ana = users.create(json!({"username": "ana"})).await.unwrap();
        users.create(json!({"username": "bo"})).await.unwrap();
        ana.set("username", "ana maria").unwrap();
        ana.save().await.unwrap();
        ana.save().await.unwrap();

        let all = users.find_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id(), ana.id());
        assert_eq!(all[0].get_str("username"), Some("ana maria"));

        let content = tokio::fs::read_to_string(temp_dir.path().join("User.json"))
            .await
            .unwrap();
        let rows: Vec<Value> = serde_json::from_str(&content).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["username"], json!("ana maria"));
    }

    #[tokio::test]
    async fn test_unsaved_changes_are_not_visible() {
        let (_store, users, _tasks, _temp_dir) = setup().await;

        let mut ana = users.create(json!({"username": "ana"})).await.unwrap();
        ana.set("age", 40).unwrap();

        let stored = users.find_by_id(&ana.id()).await.unwrap().unwrap();
        assert_eq!(stored.get("age"), None);
    }

    #[tokio::test]
    async fn test_schema_enforcement() {
        let (_store, users, _tasks, _temp_dir) = setup().await;

        let err = users.new_instance(json!({"password": "123"})).unwrap_err();
        match err {
            CairnError::SchemaViolation {
                model,
                field,
                kind,
            } => {
                assert_eq!(model, "User");
                assert_eq!(field, "username");
                assert_eq!(kind, ViolationKind::Missing);
            },
            other => panic!("unexpected error: {}", other),
        }

        let err = users
            .new_instance(json!({"username": "ana", "age": "old"}))
            .unwrap_err();
        assert!(matches!(
            err,
            CairnError::SchemaViolation {
                kind: ViolationKind::TypeMismatch {
                    expected: FieldType::Number,
                    found: "string",
                },
                ..
            }
        ));

        let err = users.create(json!({"username": 7})).await.unwrap_err();
        assert!(err.is_schema_violation());
        assert_eq!(users.count().await.unwrap(), 0);

        let defaulted = users.new_instance(json!({"username": "ana"})).unwrap();
        assert_eq!(defaulted.get_bool("active"), Some(true));
        let explicit = users
            .new_instance(json!({"username": "ana", "active": false}))
            .unwrap();
        assert_eq!(explicit.get_bool("active"), Some(false));
    }

    #[tokio::test]
    async fn test_default_satisfies_required() {
        let store = Store::new();
        let posts = store
            .model(
                "Post",
                Schema::new().field("status", FieldRule::string().required().default_value("draft")),
            )
            .await
            .unwrap();

        let post = posts.new_instance(json!({})).unwrap();
        assert_eq!(post.get_str("status"), Some("draft"));
    }

    #[tokio::test]
    async fn test_new_instance_rejects_non_objects() {
        let (_store, users, _tasks, _temp_dir) = setup().await;

        for input in [json!(null), json!("ana"), json!([1])] {
            assert!(matches!(
                users.new_instance(input).unwrap_err(),
                CairnError::Validation { .. }
            ));
        }
        assert!(matches!(
            users
                .new_instance(json!({"_id": "  ", "username": "ana"}))
                .unwrap_err(),
            CairnError::Validation { .. }
        ));
    }

    #[tokio::test]
    async fn test_set_checks_schema() {
        let (_store, users, _tasks, _temp_dir) = setup().await;
        let mut ana = users.new_instance(json!({"username": "ana"})).unwrap();

        ana.set("age", 12).unwrap().set("password", "secret").unwrap();
        assert_eq!(ana.get_f64("age"), Some(12.0));
        assert_eq!(ana.get_str("password"), Some("secret"));

        assert!(matches!(
            ana.set("nickname", "an").unwrap_err(),
            CairnError::SchemaViolation {
                kind: ViolationKind::Undeclared,
                ..
            }
        ));
        assert!(matches!(
            ana.set("username", Option::<String>::None).unwrap_err(),
            CairnError::SchemaViolation {
                kind: ViolationKind::Missing,
                ..
            }
        ));
        assert!(ana.set("age", true).unwrap_err().is_schema_violation());
        assert!(matches!(
            ana.set("_id", "x").unwrap_err(),
            CairnError::Validation { .. }
        ));
        ana.set("password", Option::<String>::None).unwrap();
        assert!(ana.get("password").unwrap().is_null());
    }

    #[tokio::test]
    async fn test_set_id_only_before_first_save() {
        let (_store, users, _tasks, _temp_dir) = setup().await;
        let mut ana = users.new_instance(json!({"username": "ana"})).unwrap();

        ana.set_id(ObjectId::new("chosen").unwrap()).unwrap();
        ana.save().await.unwrap();
        assert!(users.find_by_id("chosen").await.unwrap().is_some());

        let err = ana.set_id(ObjectId::new("other").unwrap()).unwrap_err();
        assert!(matches!(err, CairnError::Validation { .. }));

        let mut found = users.find_by_id("chosen").await.unwrap().unwrap();
        assert!(found.set_id(ObjectId::new("other").unwrap()).is_err());
    }

    #[tokio::test]
    async fn test_find_returns_matches_in_insertion_order() {
        let (_store, users, _tasks, _temp_dir) = setup().await;

        let first = users
            .create(json!({"username": "ana", "password": "123"}))
            .await
            .unwrap();
        users
            .create(json!({"username": "bo", "password": "abc"}))
            .await
            .unwrap();
        let third = users
            .create(json!({"username": "carl", "password": "123"}))
            .await
            .unwrap();

        let found = users
            .find(Filter::new().equals("password", "123"))
            .await
            .unwrap();
        let ids: Vec<_> = found.iter().map(|user| user.id()).collect();
        assert_eq!(ids, vec![first.id(), third.id()]);

        let none = users
            .find(Filter::new().equals("password", "zzz"))
            .await
            .unwrap();
        assert!(none.is_empty());

        let by_id = users
            .find(Filter::from_json(&json!({"_id": third.id(), "password": "123"})).unwrap())
            .await
            .unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].get_str("username"), Some("carl"));

        assert_eq!(users.find(Filter::new()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_find_by_reference_and_date() {
        let (_store, users, tasks, _temp_dir) = setup().await;
        let ana = users.create(json!({"username": "ana"})).await.unwrap();
        tasks
            .create(json!({"title": "write", "user": ana.id(), "due": "2025-01-02T03:04:05Z"}))
            .await
            .unwrap();
        tasks.create(json!({"title": "rest"})).await.unwrap();

        let by_user = tasks
            .find(Filter::new().equals("user", ana.object_id()))
            .await
            .unwrap();
        assert_eq!(by_user.len(), 1);

        let by_user_string = tasks
            .find(Filter::new().equals("user", ana.id()))
            .await
            .unwrap();
        assert_eq!(by_user_string.len(), 1);

        let by_due = tasks
            .find(Filter::new().equals("due", "2025-01-02T04:04:05+01:00"))
            .await
            .unwrap();
        assert_eq!(by_due.len(), 1);
        assert_eq!(by_due[0].get_str("title"), Some("write"));
    }

    #[tokio::test]
    async fn test_find_compares_numbers_by_value() {
        let temp_dir = tempdir().unwrap();
        let store = Store::new();
        let items = store
            .model(
                "Item",
                Schema::new()
                    .field("score", FieldRule::number())
                    .field("status", FieldRule::number().default_value(0)),
            )
            .await
            .unwrap();
        store.connect(temp_dir.path()).await.unwrap();
        items.create(json!({"score": 1.0})).await.unwrap();

        for filter in [
            Filter::new().equals("score", 1),
            Filter::new().equals("score", 1.0),
            Filter::new().equals("status", 0),
            Filter::new().equals("status", 0.0),
        ] {
            assert_eq!(items.find(filter.clone()).await.unwrap().len(), 1, "{:?}", filter);
        }
        assert!(items.find(Filter::new().equals("score", 2)).await.unwrap().is_empty());

        drop(store);
        let reopened = Store::new();
        let items = reopened
            .model("Item", Schema::new().field("status", FieldRule::number().default_value(0)))
            .await
            .unwrap();
        reopened.connect(temp_dir.path()).await.unwrap();
        let reloaded = items.find(Filter::new().equals("score", 1)).await.unwrap();
        assert_eq!(reloaded.len(), 1);
    }

    #[tokio::test]
    async fn test_find_filter_matches_manual_scan() {
        let (_store, users, _tasks, _temp_dir) = setup().await;
        let passwords = ["123", "abc", "xyz"];
        let mut rng = StdRng::seed_from_u64(42);

        let mut created = Vec::new();
        for n in 0 .. 40 {
            let mut fields = json!({"username": format!("user{}", n)});
            if rng.gen_bool(0.8) {
                fields["password"] = json!(passwords[rng.gen_range(0 .. passwords.len())]);
            }
            if rng.gen_bool(0.5) {
                fields["age"] = json!(rng.gen_range(18 .. 21));
            }
            created.push(users.create(fields).await.unwrap());
        }

        for _ in 0 .. 25 {
            let mut filter = Filter::new();
            let mut conditions: Vec<(&str, Value)> = Vec::new();
            if rng.gen_bool(0.7) {
                let password = json!(passwords[rng.gen_range(0 .. passwords.len())]);
                filter = filter.equals("password", FieldValue::from_json(password.clone()));
                conditions.push(("password", password));
            }
            if rng.gen_bool(0.5) {
                let age = json!(rng.gen_range(18 .. 21));
                filter = filter.equals("age", FieldValue::from_json(age.clone()));
                conditions.push(("age", age));
            }

            let expected: Vec<String> = created
                .iter()
                .filter(|user| {
                    let json = user.to_json();
                    conditions
                        .iter()
                        .all(|(field, value)| json.get(*field) == Some(value))
                })
                .map(|user| user.id())
                .collect();
            let actual: Vec<String> = users
                .find(filter)
                .await
                .unwrap()
                .iter()
                .map(|user| user.id())
                .collect();
            assert_eq!(actual, expected);
        }
    }

    #[tokio::test]
    async fn test_populate_embeds_referenced_document() {
        let (_store, users, tasks, _temp_dir) = setup().await;
        let ana = users
            .create(json!({"username": "ana", "age": 30}))
            .await
            .unwrap();
        let mut task = tasks
            .create(json!({"title": "write", "user": ana.id()}))
            .await
            .unwrap();
        assert!(matches!(task.get("user"), Some(FieldValue::ObjectId(_))));

        task.populate("user").await.unwrap();
        let embedded = task.get_embedded("user").unwrap();
        assert_eq!(embedded.get("username"), Some(&FieldValue::from("ana")));
        assert_eq!(embedded.get("_id"), Some(&FieldValue::from(ana.object_id())));
        assert_eq!(task.get_object_id("user"), Some(ana.object_id()));
        assert_eq!(
            task.to_json()["user"],
            json!({"_id": ana.id(), "username": "ana", "age": 30, "active": true})
        );
    }

    #[tokio::test]
    async fn test_populate_is_a_snapshot() {
        let (_store, users, tasks, _temp_dir) = setup().await;
        let mut ana = users.create(json!({"username": "ana"})).await.unwrap();
        let mut task = tasks
            .create(json!({"title": "write", "user": ana.id()}))
            .await
            .unwrap();
        task.populate("user").await.unwrap();

        ana.set("username", "ana maria").unwrap();
        ana.save().await.unwrap();

        let embedded = task.get_embedded("user").unwrap();
        assert_eq!(embedded.get("username"), Some(&FieldValue::from("ana")));
    }

    #[tokio::test]
    async fn test_populate_without_target_is_a_no_op() {
        let (_store, users, tasks, _temp_dir) = setup().await;
        let mut orphan = tasks
            .create(json!({"title": "write", "user": "nobody"}))
            .await
            .unwrap();
        orphan.populate("user").await.unwrap();
        assert_eq!(orphan.get_object_id("user").unwrap().as_str(), "nobody");

        let mut unassigned = tasks.create(json!({"title": "rest"})).await.unwrap();
        unassigned.populate("user").await.unwrap();
        assert_eq!(unassigned.get("user"), None);

        unassigned.populate("title").await.unwrap();
        assert_eq!(unassigned.get_str("title"), Some("rest"));

        let mut ana = users.create(json!({"username": "ana"})).await.unwrap();
        ana.populate("undeclared").await.unwrap();
        assert_eq!(ana.get_str("username"), Some("ana"));
    }

    #[tokio::test]
    async fn test_saving_populated_instance_stores_identity() {
        let (_store, users, tasks, temp_dir) = setup().await;
        let ana = users.create(json!({"username": "ana"})).await.unwrap();
        let mut task = tasks
            .create(json!({"title": "write", "user": ana.id()}))
            .await
            .unwrap();

        task.populate("user").await.unwrap();
        task.set("title", "write more").unwrap();
        task.save().await.unwrap();

        let content = tokio::fs::read_to_string(temp_dir.path().join("Task.json"))
            .await
            .unwrap();
        let rows: Vec<Value> = serde_json::from_str(&content).unwrap();
        assert_eq!(rows[0]["user"], json!(ana.id()));
        assert_eq!(rows[0]["title"], json!("write more"));
        assert!(task.get_embedded("user").is_some());
    }

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    struct Account {
        username: String,
        age:      u32,
        #[serde(default)]
        active:   bool,
    }

    #[tokio::test]
    async fn test_create_from_and_deserialize() {
        let (_store, users, _tasks, _temp_dir) = setup().await;
        let account = Account {
            username: "ana".to_owned(),
            age:      28,
            active:   false,
        };

        let created = users.create_from(&account).await.unwrap();
        let found = users.find_by_id(&created.id()).await.unwrap().unwrap();
        let read_back: Account = found.deserialize().unwrap();
        assert_eq!(read_back, account);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_keep_every_document() {
        let (_store, users, _tasks, temp_dir) = setup().await;

        let handles = (0 .. 24).map(|n| {
            let users = users.clone();
            tokio::spawn(async move {
                users
                    .create(json!({"username": format!("user{}", n)}))
                    .await
                    .unwrap()
                    .id()
            })
        });
        let ids: Vec<String> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(users.count().await.unwrap(), 24);
        let content = tokio::fs::read_to_string(temp_dir.path().join("User.json"))
            .await
            .unwrap();
        let rows: Vec<Value> = serde_json::from_str(&content).unwrap();
        assert_eq!(rows.len(), 24);
        for id in ids {
            assert!(rows.iter().any(|row| row["_id"] == json!(id)));
        }
    }

    #[tokio::test]
    async fn test_documents_survive_a_new_store() {
        let (_store, users, tasks, temp_dir) = setup().await;
        let ana = users.create(json!({"username": "ana"})).await.unwrap();
        let task = tasks
            .create(json!({"title": "write", "user": ana.id(), "due": "2025-03-01T00:00:00Z"}))
            .await
            .unwrap();

        let reopened = Store::new();
        let tasks_again = reopened.model("Task", task_schema()).await.unwrap();
        reopened.connect(temp_dir.path()).await.unwrap();

        let found = tasks_again.find_by_id(&task.id()).await.unwrap().unwrap();
        assert_eq!(found.get_object_id("user"), Some(ana.object_id()));
        assert_eq!(found.get_date("due"), task.get_date("due"));
        assert_eq!(found.to_json(), task.to_json());
    }
}
