mod analyses;
