//! Integration tests for department reads and cascading writes.

mod common;

use common::{department, employee, sales, setup};
use hr_store::models::{Department, DepartmentKey, Employee};
use hr_store::{ErrorKind, StoreError};

#[tokio::test]
async fn test_create_then_get_round_trip() {
    let store = setup().await;
    let repo = store.db.departments();
    let ctx = store.ctx();

    let input = sales();
    let mut created = Department::default();
    repo.create(&ctx, &input, &mut created).await.unwrap();

    assert_eq!(created.id, 10);
    assert_eq!(created.name, "SALES");
    assert_eq!(created.location.as_deref(), Some("NY"));
    assert_eq!(created.employees.len(), 1);
    assert_eq!(created.employees[0].department_id, Some(10));

    let mut fetched = Department::default();
    assert!(repo.get(&store.ctx(), 10, &mut fetched).await.unwrap());
    assert_eq!(fetched, created);

    let alice = &fetched.employees[0];
    assert_eq!(alice.id, 1);
    assert_eq!(alice.name.as_deref(), Some("ALICE"));
    assert_eq!(alice.salary, Some(500));
    assert_eq!(alice.department_id, Some(10));

    // Everything except the stamped foreign key matches the input.
    let mut expected = input.clone();
    expected.employees[0].department_id = Some(10);
    assert_eq!(fetched, expected);
}

#[tokio::test]
async fn test_get_missing_is_not_an_error() {
    let store = setup().await;
    let mut out = Department::default();
    let found = store
        .db
        .departments()
        .get(&store.ctx(), 404, &mut out)
        .await
        .unwrap();
    assert!(!found);
}

#[tokio::test]
async fn test_duplicate_create_conflicts() {
    let store = setup().await;
    let repo = store.db.departments();

    let mut out = Department::default();
    repo.create(&store.ctx(), &sales(), &mut out).await.unwrap();

    let second = department(10, "MARKETING", Some("LA"));
    let err = repo
        .create(&store.ctx(), &second, &mut out)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.code(), "E_CONFLICT");

    assert_eq!(store.count("SELECT COUNT(*) FROM dept WHERE deptno = 10").await, 1);
    let mut fetched = Department::default();
    repo.get(&store.ctx(), 10, &mut fetched).await.unwrap();
    assert_eq!(fetched.name, "SALES");
}

#[tokio::test]
async fn test_invalid_child_rolls_back_whole_graph() {
    let store = setup().await;
    let repo = store.db.departments();

    let mut input = department(20, "RESEARCH", Some("DALLAS"));
    input.employees.push(employee(2, "SMITH"));
    input.employees.push(Employee {
        hire_date: Some("1981-13-01".to_string()),
        ..employee(3, "JONES")
    });

    let mut out = Department::default();
    let err = repo.create(&store.ctx(), &input, &mut out).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);

    let mut fetched = Department::default();
    assert!(!repo.get(&store.ctx(), 20, &mut fetched).await.unwrap());
    let mut emp = Employee::default();
    assert!(!store.db.employees().get(&store.ctx(), 2, &mut emp).await.unwrap());
    assert_eq!(store.count("SELECT COUNT(*) FROM emp").await, 0);
}

#[tokio::test]
async fn test_duplicate_child_rolls_back_whole_graph() {
    let store = setup().await;
    let repo = store.db.departments();

    let mut input = department(30, "OPERATIONS", Some("BOSTON"));
    input.employees.push(employee(4, "BLAKE"));
    input.employees.push(employee(4, "CLARK"));

    let mut out = Department::default();
    let err = repo.create(&store.ctx(), &input, &mut out).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));

    assert_eq!(store.count("SELECT COUNT(*) FROM dept").await, 0);
    assert_eq!(store.count("SELECT COUNT(*) FROM emp").await, 0);
}

#[tokio::test]
async fn test_store_constraint_violation_rolls_back() {
    let store = setup().await;
    store
        .execute(
            "CREATE TRIGGER emp_no_clerks BEFORE INSERT ON emp \
             WHEN NEW.job = 'CLERK' BEGIN SELECT RAISE(ABORT, 'no clerks'); END",
        )
        .await;

    let mut input = department(40, "ACCOUNTING", None);
    input.employees.push(employee(5, "KING"));
    input.employees.push(Employee {
        job: Some("CLERK".to_string()),
        ..employee(6, "MILLER")
    });

    let mut out = Department::default();
    let err = store
        .db
        .departments()
        .create(&store.ctx(), &input, &mut out)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Driver);
    assert!(matches!(err, StoreError::Database { ref statement, .. } if statement == "CreateEmp"));
    assert_eq!(store.count("SELECT COUNT(*) FROM dept").await, 0);
    assert_eq!(store.count("SELECT COUNT(*) FROM emp").await, 0);
}

#[tokio::test]
async fn test_update_missing_returns_false() {
    let store = setup().await;
    let repo = store.db.departments();
    let mut out = Department::default();
    repo.create(&store.ctx(), &sales(), &mut out).await.unwrap();

    let mut input = department(99, "GHOST", None);
    input.employees.push(employee(9, "NOBODY"));
    let mut updated = Department::default();
    let exists = repo
        .update(&store.ctx(), &input, &mut updated)
        .await
        .unwrap();
    assert!(!exists);

    assert_eq!(store.count("SELECT COUNT(*) FROM dept").await, 1);
    assert_eq!(store.count("SELECT COUNT(*) FROM emp").await, 1);
}

#[tokio::test]
async fn test_update_upserts_children() {
    let store = setup().await;
    let repo = store.db.departments();
    let mut out = Department::default();
    repo.create(&store.ctx(), &sales(), &mut out).await.unwrap();

    let mut input = department(10, "SALES EMEA", None);
    input.employees.push(Employee {
        job: Some("MANAGER".to_string()),
        salary: Some(900),
        ..employee(1, "ALICE")
    });
    input.employees.push(employee(2, "BOB"));

    let mut updated = Department::default();
    let exists = repo
        .update(&store.ctx(), &input, &mut updated)
        .await
        .unwrap();
    assert!(exists);

    assert_eq!(updated.name, "SALES EMEA");
    assert_eq!(updated.location, None);
    assert_eq!(updated.employees.len(), 2);
    assert_eq!(updated.employees[0].job.as_deref(), Some("MANAGER"));
    assert_eq!(updated.employees[0].salary, Some(900));
    assert_eq!(updated.employees[1].name.as_deref(), Some("BOB"));
    assert!(updated.employees.iter().all(|e| e.department_id == Some(10)));

    let mut fetched = Department::default();
    repo.get(&store.ctx(), 10, &mut fetched).await.unwrap();
    assert_eq!(fetched, updated);
}

#[tokio::test]
async fn test_update_leaves_omitted_children() {
    let store = setup().await;
    let repo = store.db.departments();
    let mut out = Department::default();
    repo.create(&store.ctx(), &sales(), &mut out).await.unwrap();

    let input = department(10, "SALES", Some("CHICAGO"));
    let mut updated = Department::default();
    assert!(repo.update(&store.ctx(), &input, &mut updated).await.unwrap());
    assert_eq!(updated.location.as_deref(), Some("CHICAGO"));
    assert_eq!(updated.employees.len(), 1);
}

#[tokio::test]
async fn test_row_count_guard_on_update() {
    let store = setup().await;
    let repo = store.db.departments();
    let mut out = Department::default();
    repo.create(&store.ctx(), &sales(), &mut out).await.unwrap();

    store
        .execute(
            "CREATE TRIGGER dept_frozen BEFORE UPDATE ON dept \
             BEGIN SELECT RAISE(IGNORE); END",
        )
        .await;

    let input = department(10, "RENAMED", Some("NY"));
    let mut updated = Department::default();
    let err = repo
        .update(&store.ctx(), &input, &mut updated)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Consistency);
    assert!(matches!(
        err,
        StoreError::RowCount {
            expected: 1,
            actual: 0,
            ..
        }
    ));

    let mut fetched = Department::default();
    repo.get(&store.ctx(), 10, &mut fetched).await.unwrap();
    assert_eq!(fetched.name, "SALES");
}

#[tokio::test]
async fn test_row_count_guard_on_child_insert() {
    let store = setup().await;
    store
        .execute(
            "CREATE TRIGGER emp_swallowed BEFORE INSERT ON emp \
             BEGIN SELECT RAISE(IGNORE); END",
        )
        .await;

    let mut out = Department::default();
    let err = store
        .db
        .departments()
        .create(&store.ctx(), &sales(), &mut out)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::RowCount { ref statement, .. } if statement == "CreateEmp"));
    assert_eq!(store.count("SELECT COUNT(*) FROM dept").await, 0);
}

#[tokio::test]
async fn test_validation_rejects_blank_name() {
    let store = setup().await;
    let input = department(50, "  ", None);
    let mut out = Department::default();
    let err = store
        .db
        .departments()
        .create(&store.ctx(), &input, &mut out)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    assert_eq!(store.count("SELECT COUNT(*) FROM dept").await, 0);
}

#[tokio::test]
async fn test_list_and_list_keys() {
    let store = setup().await;
    let repo = store.db.departments();
    let mut out = Department::default();
    for (id, name) in [(30, "OPERATIONS"), (10, "ACCOUNTING"), (20, "RESEARCH")] {
        repo.create(&store.ctx(), &department(id, name, None), &mut out)
            .await
            .unwrap();
    }

    let mut keys: Vec<DepartmentKey> = Vec::new();
    repo.list_keys(&store.ctx(), &mut keys).await.unwrap();
    let ids: Vec<i64> = keys.iter().map(|k| k.id).collect();
    assert_eq!(ids, vec![10, 20, 30]);

    let mut all: Vec<Department> = Vec::new();
    repo.list(&store.ctx(), &mut all).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[1].name, "RESEARCH");
    assert!(all.iter().all(|d| d.employees.is_empty()));
}
