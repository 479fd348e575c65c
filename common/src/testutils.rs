use crate::scan::Totals;

pub const MAIN_PY: &str = "print('hello')\n";
pub const README: &str = "# project\n";
pub const UTIL_PY: &str = "def util():\n    return 1\n";

/// What a scan of the tree built by [`setup_project_dir`] must report.
pub const PROJECT_TOTALS: Totals = Totals {
    files: 3,
    bytes: (MAIN_PY.len() + README.len() + UTIL_PY.len()) as u64,
};

pub fn setup_project_dir() -> tempfile::TempDir {
    // create a temporary directory
    let tmp_dir = tempfile::tempdir().unwrap();
    // project
    // |- main.py
    // |- README.md
    // |- debug.log            (skipped)
    // |- .env                 (skipped)
    // |- pkg
    //    |- util.py
    //    |- util.pyc          (skipped)
    //    |- __pycache__       (skipped)
    //       |- util.cpython-312.pyc
    // |- .venv                (skipped)
    //    |- pyvenv.cfg
    // |- node_venv            (skipped)
    //    |- x.txt
    // |- build                (skipped)
    //    |- out.bin
    let project = tmp_dir.path().join("project");
    std::fs::create_dir(&project).unwrap();
    std::fs::write(project.join("main.py"), MAIN_PY).unwrap();
    std::fs::write(project.join("README.md"), README).unwrap();
    std::fs::write(project.join("debug.log"), "log line\n").unwrap();
    std::fs::write(project.join(".env"), "SECRET=1\n").unwrap();
    let pkg = project.join("pkg");
    std::fs::create_dir(&pkg).unwrap();
    std::fs::write(pkg.join("util.py"), UTIL_PY).unwrap();
    std::fs::write(pkg.join("util.pyc"), "bytecode").unwrap();
    std::fs::create_dir(pkg.join("__pycache__")).unwrap();
    std::fs::write(pkg.join("__pycache__").join("util.cpython-312.pyc"), "bytecode").unwrap();
    std::fs::create_dir(project.join(".venv")).unwrap();
    std::fs::write(project.join(".venv").join("pyvenv.cfg"), "home = /usr\n").unwrap();
    std::fs::create_dir(project.join("node_venv")).unwrap();
    std::fs::write(project.join("node_venv").join("x.txt"), "x").unwrap();
    std::fs::create_dir(project.join("build")).unwrap();
    std::fs::write(project.join("build").join("out.bin"), vec![7u8; 64]).unwrap();
    tmp_dir
}
