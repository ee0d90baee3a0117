crate::system_test_cases!(
    {
        args: &[],
        expected_stdout: "release build\n",
        expected_stderr: "make: INFO  | echo release build\n",
        expected_files: &[],
    },
    {
        args: &["FLAVOR=dev"],
        expected_stdout: "dev build\n",
        expected_stderr: "make: INFO  | echo dev build\n",
        expected_files: &[],
    },
);
