mod t2_always_make;
mod t3_old_files;
mod t4_just_print;
mod t5_pattern_rule;
mod t6_suffix_rule;
mod t7_conditional;
mod t8_include;
mod t9_parallel_build;
mod t10_cycle_detection;
mod t11_name_value_override;
