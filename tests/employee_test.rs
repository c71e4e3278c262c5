//! Integration tests for employee operations.

mod common;

use common::{department, employee, setup};
use hr_store::ErrorKind;
use hr_store::models::{Department, Employee, EmployeeKey};

async fn setup_with_department() -> common::TestStore {
    let store = setup().await;
    let mut out = Department::default();
    store
        .db
        .departments()
        .create(&store.ctx(), &department(10, "SALES", Some("NY")), &mut out)
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn test_create_get_update() {
    let store = setup_with_department().await;
    let repo = store.db.employees();

    let input = Employee {
        job: Some("CLERK".to_string()),
        hire_date: Some("1980-12-17".to_string()),
        salary: Some(800),
        commission: Some(0),
        department_id: Some(10),
        ..employee(7369, "SMITH")
    };
    let mut created = Employee::default();
    repo.create(&store.ctx(), &input, &mut created).await.unwrap();
    assert_eq!(created, input);

    let changed = Employee {
        job: Some("ANALYST".to_string()),
        manager: Some(7566),
        salary: Some(3000),
        commission: None,
        ..input.clone()
    };
    let mut updated = Employee::default();
    assert!(repo.update(&store.ctx(), &changed, &mut updated).await.unwrap());
    assert_eq!(updated, changed);

    let mut fetched = Employee::default();
    assert!(repo.get(&store.ctx(), 7369, &mut fetched).await.unwrap());
    assert_eq!(fetched, changed);
}

#[tokio::test]
async fn test_update_missing_employee() {
    let store = setup_with_department().await;
    let mut out = Employee::default();
    let exists = store
        .db
        .employees()
        .update(&store.ctx(), &employee(1, "NOBODY"), &mut out)
        .await
        .unwrap();
    assert!(!exists);
    assert_eq!(store.count("SELECT COUNT(*) FROM emp").await, 0);
}

#[tokio::test]
async fn test_duplicate_employee_conflicts() {
    let store = setup_with_department().await;
    let repo = store.db.employees();
    let mut out = Employee::default();
    repo.create(&store.ctx(), &employee(1, "ALICE"), &mut out)
        .await
        .unwrap();
    let err = repo
        .create(&store.ctx(), &employee(1, "ALICIA"), &mut out)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_unknown_department_is_driver_error() {
    let store = setup_with_department().await;
    let input = Employee {
        department_id: Some(77),
        ..employee(1, "ALICE")
    };
    let mut out = Employee::default();
    let err = store
        .db
        .employees()
        .create(&store.ctx(), &input, &mut out)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Driver);
    assert!(err.request_id() > 0);
}

#[tokio::test]
async fn test_negative_salary_rejected_before_write() {
    let store = setup_with_department().await;
    let input = Employee {
        salary: Some(-100),
        ..employee(1, "ALICE")
    };
    let mut out = Employee::default();
    let err = store
        .db
        .employees()
        .create(&store.ctx(), &input, &mut out)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E_INPUT");
}

#[tokio::test]
async fn test_list_by_department() {
    let store = setup_with_department().await;
    let repo = store.db.employees();
    let mut out = Employee::default();
    for (id, name) in [(3, "CAROL"), (1, "ALICE"), (2, "BOB")] {
        let input = Employee {
            department_id: Some(10),
            ..employee(id, name)
        };
        repo.create(&store.ctx(), &input, &mut out).await.unwrap();
    }
    repo.create(&store.ctx(), &employee(4, "DRIFTER"), &mut out)
        .await
        .unwrap();

    let mut staff: Vec<Employee> = Vec::new();
    repo.list_by_department(&store.ctx(), 10, &mut staff)
        .await
        .unwrap();
    let names: Vec<_> = staff.iter().filter_map(|e| e.name.as_deref()).collect();
    assert_eq!(names, vec!["ALICE", "BOB", "CAROL"]);

    let mut keys: Vec<EmployeeKey> = Vec::new();
    repo.keys_by_department(&store.ctx(), 10, &mut keys)
        .await
        .unwrap();
    assert_eq!(keys.iter().map(|k| k.id).collect::<Vec<_>>(), vec![1, 2, 3]);

    repo.keys_by_department(&store.ctx(), 99, &mut keys)
        .await
        .unwrap();
    assert!(keys.is_empty());
}
