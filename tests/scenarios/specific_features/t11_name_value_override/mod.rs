crate::system_test_cases!(
    {
        args: &[],
        expected_stdout: "hello\n",
        expected_stderr: "make: INFO  | echo hello\n",
        expected_files: &[],
    },
    {
        args: &["GREETING=hi"],
        expected_stdout: "hi\n",
        expected_stderr: "make: INFO  | echo hi\n",
        expected_files: &[],
    },
);
