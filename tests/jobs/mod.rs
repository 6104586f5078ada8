mod jobs_integration_test;
