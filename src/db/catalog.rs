//! SQL statements for the Department and Employee tables.
//!
//! Changing the schema means changing this catalog; it is not data driven.
//! Read statements are prepared at startup. DML uses positional placeholders
//! bound by the entity's `DmlParams` implementation in the same order.

use crate::db::statements::RegistryBuilder;

pub const GET_DEPT: &str = "GetDept";
pub const GET_DEPT_UK: &str = "GetDeptUK";
pub const DEPT_EXISTS: &str = "DeptExists";
pub const GET_DEPTS: &str = "GetDepts";
pub const GET_DEPTS_PK: &str = "GetDeptsPK";
pub const CREATE_DEPT: &str = "CreateDept";
pub const UPDATE_DEPT: &str = "UpdateDept";

pub const EMP_EXISTS: &str = "EmpExists";
pub const GET_EMP: &str = "GetEmp";
pub const GET_EMP_UK: &str = "GetEmpUK";
pub const GET_EMPS_BY_DEPT: &str = "GetEmpsByDept";
pub const GET_EMPS_PK_BY_DEPT: &str = "GetEmpsPKByDept";
pub const CREATE_EMP: &str = "CreateEmp";
pub const UPDATE_EMP: &str = "UpdateEmp";

macro_rules! emp_select {
    ($tail:literal) => {
        concat!(
            "SELECT empno, ename, job, mgr, hiredate, sal, comm, deptno FROM emp ",
            $tail
        )
    };
}

/// The full catalog, ready to be prepared.
pub fn statements() -> RegistryBuilder {
    RegistryBuilder::new()
        // dept
        .register(GET_DEPT, "SELECT deptno, dname, loc FROM dept WHERE deptno = $1", true)
        .register(GET_DEPT_UK, "SELECT deptno, dname, loc FROM dept WHERE deptno = $1", true)
        .register(DEPT_EXISTS, "SELECT deptno FROM dept WHERE deptno = $1", true)
        .register(GET_DEPTS, "SELECT deptno, dname, loc FROM dept ORDER BY deptno", true)
        .register(GET_DEPTS_PK, "SELECT deptno FROM dept ORDER BY deptno", true)
        .register(
            CREATE_DEPT,
            "INSERT INTO dept (deptno, dname, loc) VALUES ($1, $2, $3)",
            false,
        )
        .register(
            UPDATE_DEPT,
            "UPDATE dept SET dname = $2, loc = $3 WHERE deptno = $1",
            false,
        )
        // emp
        .register(EMP_EXISTS, "SELECT empno FROM emp WHERE empno = $1", true)
        .register(GET_EMP, emp_select!("WHERE empno = $1"), true)
        .register(GET_EMP_UK, emp_select!("WHERE empno = $1"), true)
        .register(GET_EMPS_BY_DEPT, emp_select!("WHERE deptno = $1 ORDER BY empno"), true)
        .register(
            GET_EMPS_PK_BY_DEPT,
            "SELECT empno FROM emp WHERE deptno = $1 ORDER BY empno",
            true,
        )
        .register(
            CREATE_EMP,
            "INSERT INTO emp (empno, ename, job, mgr, hiredate, sal, comm, deptno) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            false,
        )
        .register(
            UPDATE_EMP,
            "UPDATE emp SET ename = $2, job = $3, mgr = $4, hiredate = $5, \
             sal = $6, comm = $7, deptno = $8 WHERE empno = $1",
            false,
        )
}
