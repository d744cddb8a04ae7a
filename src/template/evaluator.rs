//! Multi-valued evaluation of a template group.
//!
//! Implements §4.4: a cycle-tolerant recursive evaluator where the
//! `evaluated` guard is set *before* recursing into placeholders, so a
//! reference cycle terminates instead of looping. Every template ends up
//! with at least one value.

use crate::template::group::{Group, Kind, Placeholder, TemplateId};

impl Group {
    /// Evaluate the main template and return its value sequence. Resets the
    /// `evaluated` guard across the whole arena first, so this can be called
    /// repeatedly after `clear_values` + a fresh batch of attributes.
    pub fn evaluate_main(&mut self) -> &[String] {
        for t in &mut self.templates {
            t.evaluated = false;
        }
        let main = self.main;
        self.evaluate(main);
        &self.get(main).values
    }

    fn evaluate(&mut self, id: TemplateId) {
        if self.get(id).evaluated {
            return;
        }
        self.get_mut(id).evaluated = true;
        self.get_mut(id).values.clear();

        if self.get(id).kind == Kind::Attribute {
            if self.get(id).values.is_empty() {
                self.get_mut(id).values.push(String::new());
            }
            return;
        }

        // Clone the (small) placeholder list so we can mutate the arena
        // freely — including `id` itself indirectly through recursion —
        // while iterating it.
        let placeholders = self.get(id).placeholders.clone();

        // 1st pass: evaluate every placeholder (recurses into targets,
        // resolves conditional branches into their result template).
        let mut joined_cache: Vec<Option<String>> = Vec::with_capacity(placeholders.len());
        for ph in &placeholders {
            joined_cache.push(self.evaluate_placeholder(ph));
        }

        let n = self.num_values(&placeholders);
        let l = self.max_length(id, &placeholders, &joined_cache);

        let mut buffers: Vec<String> = (0..n).map(|_| String::with_capacity(l)).collect();

        let chunks = self.get(id).chunks.clone();
        for buf in &mut buffers {
            buf.push_str(&chunks[0]);
        }
        for (j, ph) in placeholders.iter().enumerate() {
            for (slot, buf) in buffers.iter_mut().enumerate() {
                self.append_placeholder_value(buf, ph, &joined_cache[j], slot);
            }
            for buf in &mut buffers {
                buf.push_str(&chunks[j + 1]);
            }
        }

        self.get_mut(id).values = buffers;
    }

    /// Evaluates one placeholder's dependencies. For `join`, returns the
    /// precomputed joined string (same value in every slot). For
    /// `conditional`, populates the synthetic result template's values.
    fn evaluate_placeholder(&mut self, ph: &Placeholder) -> Option<String> {
        match ph {
            Placeholder::Plain { target } => {
                self.evaluate(*target);
                None
            }
            Placeholder::Join { target, sep } => {
                self.evaluate(*target);
                let values = &self.get(*target).values;
                Some(join_values(values, sep))
            }
            Placeholder::Conditional {
                cond,
                is_concat,
                then_id,
                else_id,
                result_id,
            } => {
                self.evaluate(*cond);
                let cond_values = self.get(*cond).values.clone();
                // `cond` may be cycle-guarded back to an ancestor still
                // being evaluated, in which case its `values` is left
                // cleared rather than refilled (see `evaluate`'s cycle
                // guard). Treat that the same way `value_at_slot` treats
                // an empty target: as if it held a single empty string.

                let result = if *is_concat {
                    self.evaluate_concat_conditional(&cond_values, *then_id, *else_id)
                } else {
                    self.evaluate_plain_conditional(&cond_values, *then_id, *else_id)
                };

                let result_tpl = self.get_mut(*result_id);
                result_tpl.values = result;
                result_tpl.evaluated = true;
                None
            }
        }
    }

    fn evaluate_concat_conditional(
        &mut self,
        cond_values: &[String],
        then_id: TemplateId,
        else_id: TemplateId,
    ) -> Vec<String> {
        let any_nonempty = cond_values.iter().any(|v| !v.is_empty());
        let chosen = if any_nonempty { then_id } else { else_id };
        self.evaluate(chosen);
        self.get(chosen).values.clone()
    }

    fn evaluate_plain_conditional(
        &mut self,
        cond_values: &[String],
        then_id: TemplateId,
        else_id: TemplateId,
    ) -> Vec<String> {
        self.evaluate(then_id);
        self.evaluate(else_id);

        // `cond_values` can be empty when `cond` is cycle-guarded back to an
        // ancestor still being evaluated (its `values` left cleared rather
        // than refilled). `value_at_slot` already treats an empty sequence
        // as a single empty string, so reuse it here instead of indexing
        // `cond_values` directly.
        let then_len = self.get(then_id).values.len();
        let else_len = self.get(else_id).values.len();
        let n = cond_values.len().max(then_len).max(else_len).max(1);

        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let nonempty = !value_at_slot(cond_values, i).is_empty();
            let (branch_values, blen) = if nonempty {
                (&self.get(then_id).values, then_len)
            } else {
                (&self.get(else_id).values, else_len)
            };
            let b_idx = i.min(blen - 1);
            out.push(branch_values[b_idx].clone());
        }
        out
    }

    fn num_values(&self, placeholders: &[Placeholder]) -> usize {
        let mut n = 1usize;
        for ph in placeholders {
            match ph {
                Placeholder::Join { .. } => {}
                Placeholder::Plain { target } => n = n.max(self.get(*target).values.len()),
                Placeholder::Conditional { result_id, .. } => {
                    n = n.max(self.get(*result_id).values.len())
                }
            }
        }
        n
    }

    fn max_length(
        &self,
        id: TemplateId,
        placeholders: &[Placeholder],
        joined_cache: &[Option<String>],
    ) -> usize {
        let mut len: usize = self.get(id).chunks.iter().map(|c| c.len()).sum();
        for (j, ph) in placeholders.iter().enumerate() {
            len += match ph {
                Placeholder::Plain { target } => {
                    self.get(*target).values.iter().map(|v| v.len()).max().unwrap_or(0)
                }
                Placeholder::Join { .. } => joined_cache[j].as_ref().map(|s| s.len()).unwrap_or(0),
                Placeholder::Conditional { result_id, .. } => self
                    .get(*result_id)
                    .values
                    .iter()
                    .map(|v| v.len())
                    .max()
                    .unwrap_or(0),
            };
        }
        len
    }

    fn append_placeholder_value(
        &self,
        buf: &mut String,
        ph: &Placeholder,
        joined: &Option<String>,
        slot: usize,
    ) {
        match ph {
            Placeholder::Plain { target } => {
                buf.push_str(value_at_slot(&self.get(*target).values, slot));
            }
            Placeholder::Join { .. } => {
                if let Some(s) = joined {
                    buf.push_str(s);
                }
            }
            Placeholder::Conditional { result_id, .. } => {
                buf.push_str(value_at_slot(&self.get(*result_id).values, slot));
            }
        }
    }
}

/// Positional pairing with last-value replication: slot `i` reads
/// `values[min(i, len - 1)]`, or "" if `values` is empty.
fn value_at_slot(values: &[String], i: usize) -> &str {
    if values.is_empty() {
        ""
    } else {
        &values[i.min(values.len() - 1)]
    }
}

fn join_values(values: &[String], sep: &str) -> String {
    values.join(sep)
}

#[cfg(test)]
mod tests {
    use crate::template::group::build_group;

    fn eval(main: &str, sources: &[(&str, &str)], attrs: &[(&str, &[&str])]) -> Vec<String> {
        let mut group = build_group(main, sources.iter().copied(), "<$", "$>").unwrap();
        for (name, values) in attrs {
            for v in *values {
                group.set_attribute(name, *v);
            }
        }
        group.evaluate_main().to_vec()
    }

    #[test]
    fn positional_multi_value() {
        let out = eval(
            "M",
            &[("M", "ab<$P1$>cd<$P2$><$P3$>ef<$P4$>")],
            &[
                ("P1", &["XX"]),
                ("P2", &["YY", "ZZ", "TT"]),
                ("P3", &["UU", "WW"]),
                ("P4", &["VV", "SS"]),
            ],
        );
        assert_eq!(
            out,
            vec!["abXXcdYYUUefVV", "abXXcdZZWWefSS", "abXXcdTTWWefSS"]
        );
    }

    #[test]
    fn join_with_separator() {
        let out = eval(
            "Top",
            &[
                ("Top", "<$M: join(=*=)$>"),
                ("M", "ab<$P1$>cd<$P2$><$P3$>ef<$P4$>"),
            ],
            &[
                ("P1", &["XX"]),
                ("P2", &["YY", "ZZ", "TT"]),
                ("P3", &["UU", "WW"]),
                ("P4", &["VV", "SS"]),
            ],
        );
        assert_eq!(
            out,
            vec!["abXXcdYYUUefVV=*=abXXcdZZWWefSS=*=abXXcdTTWWefSS"]
        );
    }

    #[test]
    fn empty_join_separator() {
        let out = eval(
            "Top",
            &[
                ("Top", "<$M: join()$>"),
                ("M", "ab<$P1$>cd<$P2$><$P3$>ef<$P4$>"),
            ],
            &[
                ("P1", &["XX"]),
                ("P2", &["YY", "ZZ", "TT"]),
                ("P3", &["UU", "WW"]),
                ("P4", &["VV", "SS"]),
            ],
        );
        assert_eq!(out, vec!["abXXcdYYUUefVVabXXcdZZWWefSSabXXcdTTWWefSS"]);
    }

    #[test]
    fn conditional_no_concat() {
        let out = eval(
            "M",
            &[("M", "<$if C$>yes<$else$>no<$endif$>")],
            &[("C", &["1", "", "2"])],
        );
        assert_eq!(out, vec!["yes", "no", "yes"]);
    }

    #[test]
    fn conditional_with_concat() {
        let out = eval(
            "M",
            &[("M", "<$if concat(C)$>Y<$else$>N<$endif$>")],
            &[("C", &["", "", "x"])],
        );
        assert_eq!(out, vec!["Y"]);

        let out = eval(
            "M",
            &[("M", "<$if concat(C)$>Y<$else$>N<$endif$>")],
            &[("C", &["", ""])],
        );
        assert_eq!(out, vec!["N"]);
    }

    #[test]
    fn cycle_tolerance_terminates() {
        let mut group =
            build_group("A", [("A", "<$B$>"), ("B", "<$A$>")], "<$", "$>").unwrap();
        let out = group.evaluate_main().to_vec();
        assert!(!out.is_empty());
    }

    #[test]
    fn conditional_cycling_through_its_own_cond_does_not_crash() {
        // `A`'s conditional uses `A` itself as the condition; evaluating `A`
        // recurses into evaluating `A`'s cond, which is cycle-guarded back
        // to the same template still mid-evaluation (empty `values`).
        let mut group =
            build_group("A", [("A", "<$if A$>yes<$else$>no<$endif$>")], "<$", "$>").unwrap();
        let out = group.evaluate_main().to_vec();
        assert!(!out.is_empty());
    }

    #[test]
    fn conditionals_cycling_through_each_other_as_cond_do_not_crash() {
        let mut group = build_group(
            "A",
            [
                ("A", "<$if B$>a-yes<$else$>a-no<$endif$>"),
                ("B", "<$if A$>b-yes<$else$>b-no<$endif$>"),
            ],
            "<$",
            "$>",
        )
        .unwrap();
        let out = group.evaluate_main().to_vec();
        assert!(!out.is_empty());
    }

    #[test]
    fn clear_values_is_idempotent() {
        let mut group = build_group("M", [("M", "x<$P$>y")], "<$", "$>").unwrap();
        group.set_attribute("P", "1");
        let first = group.evaluate_main().to_vec();
        group.clear_values();
        group.clear_values();
        group.set_attribute("P", "1");
        let second = group.evaluate_main().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn attribute_defaults_to_empty_string() {
        let out = eval("M", &[("M", "x<$P$>y")], &[]);
        assert_eq!(out, vec!["xy"]);
    }

    #[test]
    fn round_trip_reconstructs_original_source() {
        // Bind each placeholder's sole value to its own reconstruction text;
        // the rendered output must equal the original source byte-for-byte.
        let src = "ab<$P1$>cd<$P2$>ef";
        let out = eval(
            "M",
            &[("M", src)],
            &[("P1", &["<$P1$>"]), ("P2", &["<$P2$>"])],
        );
        assert_eq!(out, vec![src]);
    }
}
