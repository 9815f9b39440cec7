//! Theoretical background.
//!
//! # Contents
//! - [Background](#background)
//! - [The c-product](#the-c-product)
//! - [Derivatives with respect to exponents](#derivatives-with-respect-to-exponents)
//! - [Reparameterization](#reparameterization)
//! - [Newton's method and continuation](#newtons-method-and-continuation)
//!
//! # Background
//! In the complex-basis-function approach to photoionization[^1], the
//! frequency-dependent polarizability (and, through its imaginary part, the
//! photoionization cross section) is given by a matrix element of the
//! resolvent of the Hamiltonian,
//! ```text
//! α(w) = ⟨S| (E0 + w − H)⁻¹ |R⟩
//! ```
//! where *E*0 is the energy of the initial bound state, *w* is the photon
//! energy, and *R* = *S* is the dipole operator acting on the bound state. For
//! *w* + *E*0 > 0 the resolvent has no bound-state representation, but it can
//! be approximated in a finite basis of functions whose exponents are
//! complex,
//! ```text
//! uᵢ(r) = Nᵢ rⁿ exp(−ζᵢ r^p),   p = 1 (Slater) or 2 (Gaussian)
//! ```
//! in which case the matrix element becomes
//! ```text
//! α(w) ≈ Sᵀ L(w)⁻¹ R
//! L(w)ᵢⱼ = ⟨uᵢ| E0 + w − H |uⱼ⟩
//! Sᵢ = ⟨uᵢ|S⟩,   Rᵢ = ⟨uᵢ|R⟩
//! ```
//! The approximation is insensitive to the exponents only when they are
//! chosen well. Since *α* is an analytic function of the *ζ*ᵢ, the natural
//! choice is a point at which it is stationary,
//! ```text
//! ∂α/∂ζᵢ = 0   for all optimized i
//! ```
//! which is a complex root-finding problem rather than a minimization.
//!
//! # The c-product
//! Matrix elements are taken with the unconjugated ("c-") product
//! ```text
//! (u|v) = ∫ u(r) v(r) dr
//! ```
//! under which the radial Hamiltonian with complex exponents is complex
//! symmetric, *L*ᵀ = *L*. Every "transpose" and "dot" in this crate is
//! therefore unconjugated, and normalization constants are fixed by
//! (*u*|*u*) = 1 using the principal branch of the square root.
//!
//! For the primitive `rⁿ exp(−ζ r^p)` all required integrals have the closed
//! form
//! ```text
//! ∫ rᵐ exp(−z r^p) dr = Γ((m + 1)/p) / (p z^((m + 1)/p))
//! ```
//! for Re *z* > 0.
//!
//! # Derivatives with respect to exponents
//! Writing *G* = *L*⁻¹, the rule *dG* = −*G* *dL* *G* gives
//! ```text
//! ∂α/∂ζᵢ       = Sᵢᵀ G R + Sᵀ G Rᵢ − Sᵀ G Lᵢ G R
//! ```
//! where subscripts denote derivatives. Because each exponent appears in only
//! one basis function, the derivative of a normalized basis function
//! `∂uᵢ/∂ζᵢ` is itself a short linear combination of primitives, and the
//! derivative matrices are rank two:
//! ```text
//! (Lᵢ)ₖₗ = δₖᵢ (u'ᵢ| L |uₗ) + (uₖ| L |u'ᵢ) δₗᵢ
//! ```
//! Defining `u = Gᵀ S`, `v = G R` and applying this structure reduces the
//! gradient to *O*(*N*) work once *G* is known, and the Hessian to *O*(*N*²)
//! work. The second derivatives contain the terms
//! ```text
//! ∂²α/∂ζᵢ∂ζⱼ = Sᵢⱼᵀ v + uᵀ Rᵢⱼ − uᵀ Lᵢⱼ v
//!            + Sᵢᵀ G Rⱼ + Sⱼᵀ G Rᵢ
//!            − Sᵢᵀ G Lⱼ v − Sⱼᵀ G Lᵢ v
//!            − uᵀ Lᵢ G Rⱼ − uᵀ Lⱼ G Rᵢ
//!            + uᵀ Lᵢ G Lⱼ v + uᵀ Lⱼ G Lᵢ v
//! ```
//! The vectors *S*ᵢⱼ and *R*ᵢⱼ vanish unless *i* = *j*. The matrix *L*ᵢⱼ
//! does not: for *i* ≠ *j* it has exactly two nonzero entries,
//! ```text
//! (Lᵢⱼ)ᵢⱼ = (u'ᵢ| L |u'ⱼ),   (Lᵢⱼ)ⱼᵢ = (u'ⱼ| L |u'ᵢ)
//! ```
//! while for *i* = *j* it picks up the second derivative of the function
//! itself,
//! ```text
//! (Lᵢᵢ)ₖₗ = δₖᵢ (u''ᵢ| L |uₗ) + (uₖ| L |u''ᵢ) δₗᵢ + 2 δₖᵢ δₗᵢ (u'ᵢ| L |u'ᵢ)
//! ```
//!
//! # Reparameterization
//! Optimizing the raw exponents directly is often poorly conditioned. The
//! exponents *x* are instead written as functions *x*(*y*) of a smaller or
//! better-scaled set of variables *y*, e.g.
//! ```text
//! log:        xᵢ = exp(yᵢ)
//! geometric:  xₖ = a rᵏ,  y = (a, r)
//! shift:      xᵢ = aᵢ + y
//! scale:      xᵢ = aᵢ y
//! ```
//! and derivatives are pulled back with the chain rule,
//! ```text
//! ∂F/∂yₖ      = Σᵢ (∂F/∂xᵢ) (∂xᵢ/∂yₖ)
//! ∂²F/∂yₖ∂yₗ  = Σᵢⱼ (∂xᵢ/∂yₖ) (∂²F/∂xᵢ∂xⱼ) (∂xⱼ/∂yₗ)
//!             + Σᵢ (∂F/∂xᵢ) (∂²xᵢ/∂yₖ∂yₗ)
//! ```
//! A composite transform partitions the raw exponents into disjoint blocks,
//! each with its own transform and variables, so its Jacobian is block
//! diagonal.
//!
//! # Newton's method and continuation
//! The stationary point is found with the complex Newton iteration
//! ```text
//! y ← y − (∂²F)⁻¹ ∂F
//! ```
//! which is only locally convergent. The stationary exponents, however, vary
//! smoothly with the frequency *w*, so a schedule of frequencies is solved by
//! continuation: starting from a guess at a reference frequency *w*0, each
//! solve is started from the result at the nearest frequency already solved,
//! sweeping down from *w*0 and then up from it.
//!
//! [^1]: T. N. Rescigno and C. W. McCurdy, "Locally complex distortions of the
//! energy spectrum in the calculation of scattering amplitudes and
//! photoionization cross sections." Phys. Rev. A **31** 624 (1985).
